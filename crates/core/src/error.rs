//! Error taxonomy for the analytics and sync core.
//!
//! Provider-facing failures are recoverable and recorded in sync logs;
//! `Internal` marks an invariant breach and aborts the run.

use thiserror::Error;

/// Classification of a core error, used by retry and sync-log policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Transient,
    ProviderInvalid,
    IntegrityConflict,
    StrategyReject,
    Internal,
}

/// Structured error crossing the core's outer boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed symbol, reversed date range, unsorted bars. Fails fast at
    /// the API boundary and is never persisted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Upstream reports no such symbol or no data.
    #[error("not found: {symbol}")]
    NotFound { symbol: String },

    /// Network failure, timeout, or rate limit. Retryable.
    #[error("transient failure for {symbol}: {message}")]
    Transient { symbol: String, message: String },

    /// Upstream returned an unparseable or self-contradictory payload.
    #[error("provider returned invalid data for {symbol}: {message}")]
    ProviderInvalid { symbol: String, message: String },

    /// A concurrent writer violated a uniqueness key.
    #[error("uniqueness conflict on {key}")]
    IntegrityConflict { key: String },

    /// A backtest intent was rejected (for example insufficient cash).
    /// Recorded in the trade log, not treated as a failure.
    #[error("intent rejected: {0}")]
    StrategyReject(String),

    /// Invariant breach. The run aborts.
    #[error("internal invariant breach: {0}")]
    Internal(String),
}

impl CoreError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::ProviderInvalid { .. } => ErrorKind::ProviderInvalid,
            Self::IntegrityConflict { .. } => ErrorKind::IntegrityConflict,
            Self::StrategyReject(_) => ErrorKind::StrategyReject,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for failures that a bounded retry loop may attempt again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Symbol context, when the error is scoped to one instrument.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::NotFound { symbol }
            | Self::Transient { symbol, .. }
            | Self::ProviderInvalid { symbol, .. } => Some(symbol),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        let err = CoreError::Transient {
            symbol: "HK.00700".to_string(),
            message: "timeout".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn invalid_input_is_not_retryable() {
        let err = CoreError::InvalidInput("reversed date range".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn symbol_context_is_exposed() {
        let err = CoreError::NotFound {
            symbol: "US.NVDA".to_string(),
        };
        assert_eq!(err.symbol(), Some("US.NVDA"));
        assert_eq!(CoreError::Internal("low > high".to_string()).symbol(), None);
    }
}
