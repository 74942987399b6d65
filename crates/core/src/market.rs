//! Markets and canonical symbol identifiers.
//!
//! The canonical form is `MARKET.CODE` (for example `HK.00700`). A-share
//! codes arriving as `SH.*`, `SZ.*` or `CN.*` are normalized to market `A`
//! at parse time; bare codes fall back to market inference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Market a symbol trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    Hk,
    Us,
    A,
}

impl Market {
    /// Canonical string form used in persistence and symbol display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hk => "HK",
            Self::Us => "US",
            Self::A => "A",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HK" => Ok(Self::Hk),
            "US" => Ok(Self::Us),
            // Exchange-prefixed A-share forms collapse to one market.
            "A" | "SH" | "SZ" | "CN" => Ok(Self::A),
            other => Err(CoreError::InvalidInput(format!("unknown market: {other}"))),
        }
    }
}

/// Canonical `(market, code)` instrument identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    pub market: Market,
    pub code: String,
}

impl Symbol {
    #[must_use]
    pub fn new(market: Market, code: impl Into<String>) -> Self {
        Self {
            market,
            code: code.into(),
        }
    }

    /// Parses `MARKET.CODE` or a bare code with market inference.
    ///
    /// Inference rules for bare codes: six digits is an A-share, up to five
    /// digits is Hong Kong (zero-padded to five), anything alphabetic is a
    /// US ticker.
    ///
    /// # Errors
    /// Returns `InvalidInput` for empty input or an unknown market prefix.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidInput("empty symbol".to_string()));
        }

        if let Some((prefix, code)) = trimmed.split_once('.') {
            if code.is_empty() {
                return Err(CoreError::InvalidInput(format!(
                    "symbol {trimmed} has no code part"
                )));
            }
            let market = Market::from_str(prefix)?;
            let code = match market {
                Market::Us => code.to_ascii_uppercase(),
                _ => code.to_string(),
            };
            return Ok(Self::new(market, code));
        }

        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            if trimmed.len() == 6 {
                return Ok(Self::new(Market::A, trimmed));
            }
            if trimmed.len() <= 5 {
                return Ok(Self::new(Market::Hk, format!("{trimmed:0>5}")));
            }
            return Err(CoreError::InvalidInput(format!(
                "numeric code {trimmed} matches no market"
            )));
        }

        if trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(Self::new(Market::Us, trimmed.to_ascii_uppercase()));
        }

        Err(CoreError::InvalidInput(format!("malformed symbol: {trimmed}")))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.market, self.code)
    }
}

impl FromStr for Symbol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
