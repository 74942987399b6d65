//! Round-trip trade pairing.
//!
//! Fills pair LIFO per `(account, market, code, instrument)`: a sell pops
//! from the top of the open-lot stack, splitting lots as needed. A sell
//! that outruns the stack leaves an unpaired residual. Fees are allocated
//! proportionally when lots split.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stocklens_core::traits::TradeSide;
use stocklens_core::{Market, MultiplierTable};

/// Instrument class; options carry a contract multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    Stock,
    Option,
}

impl Instrument {
    /// HK options carry alphabetic characters in the code; US options
    /// follow `SYMBOL + YYMMDD + C/P + STRIKE`.
    #[must_use]
    pub fn classify(market: Market, code: &str) -> Self {
        match market {
            Market::Hk => {
                if code.chars().any(|c| c.is_ascii_alphabetic()) {
                    Self::Option
                } else {
                    Self::Stock
                }
            }
            Market::Us => {
                if is_us_option_code(code) {
                    Self::Option
                } else {
                    Self::Stock
                }
            }
            Market::A => Self::Stock,
        }
    }
}

/// `SYMBOL + YYMMDD + [CP] + STRIKE`, e.g. `MU260116C230000`.
fn is_us_option_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    let symbol_len = bytes.iter().take_while(|b| b.is_ascii_uppercase()).count();
    if symbol_len == 0 || symbol_len + 8 > bytes.len() {
        return false;
    }
    let rest = &bytes[symbol_len..];
    if !rest[..6].iter().all(u8::is_ascii_digit) {
        return false;
    }
    if rest[6] != b'C' && rest[6] != b'P' {
        return false;
    }
    rest[7..].iter().all(u8::is_ascii_digit) && rest.len() > 7
}

/// One executed fill fed into the pairer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFill {
    pub account_id: i64,
    pub deal_id: String,
    pub trade_time: DateTime<Utc>,
    pub market: Market,
    pub code: String,
    pub side: TradeSide,
    pub qty: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
}

/// A paired open/close round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTrip {
    pub account_id: i64,
    pub market: Market,
    pub code: String,
    pub instrument: Instrument,
    pub qty: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub gross_pnl: Decimal,
    pub fees: Decimal,
    pub net_pnl: Decimal,
    /// Net P&L over entry notional.
    pub pnl_ratio: Decimal,
    pub hold_days: i64,
    pub entry_deal_ids: Vec<String>,
    pub exit_deal_ids: Vec<String>,
}

impl RoundTrip {
    #[must_use]
    pub fn is_win(&self) -> bool {
        self.net_pnl > Decimal::ZERO
    }
}

/// A sell (or part of one) that found no open lot to close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Residual {
    pub account_id: i64,
    pub market: Market,
    pub code: String,
    pub instrument: Instrument,
    pub deal_id: String,
    pub qty: Decimal,
    pub price: Decimal,
}

/// Output of a pairing pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairingOutcome {
    pub round_trips: Vec<RoundTrip>,
    /// Open lots remaining after all sells are consumed.
    pub open_qty: Decimal,
    pub residuals: Vec<Residual>,
}

#[derive(Debug, Clone)]
struct OpenLot {
    deal_id: String,
    trade_time: DateTime<Utc>,
    price: Decimal,
    original_qty: Decimal,
    remaining_qty: Decimal,
    fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueueKey {
    account_id: i64,
    market: Market,
    code: String,
    instrument: Instrument,
}

/// LIFO pairing engine.
#[derive(Debug, Clone, Default)]
pub struct TradePairer {
    multipliers: MultiplierTable,
}

impl TradePairer {
    #[must_use]
    pub fn new(multipliers: MultiplierTable) -> Self {
        Self { multipliers }
    }

    /// Pairs fills into round trips. Input order does not matter; fills
    /// are processed in trade-time order.
    #[must_use]
    pub fn pair(&self, fills: &[TradeFill]) -> PairingOutcome {
        let mut sorted: Vec<&TradeFill> = fills.iter().collect();
        sorted.sort_by(|a, b| {
            a.trade_time
                .cmp(&b.trade_time)
                .then_with(|| a.deal_id.cmp(&b.deal_id))
        });

        let mut stacks: Vec<(QueueKey, Vec<OpenLot>)> = Vec::new();
        let mut outcome = PairingOutcome::default();

        for fill in sorted {
            let key = QueueKey {
                account_id: fill.account_id,
                market: fill.market,
                code: fill.code.clone(),
                instrument: Instrument::classify(fill.market, &fill.code),
            };
            let idx = match stacks.iter().position(|(k, _)| *k == key) {
                Some(i) => i,
                None => {
                    stacks.push((key.clone(), Vec::new()));
                    stacks.len() - 1
                }
            };
            let stack = &mut stacks[idx].1;

            match fill.side {
                TradeSide::Buy => stack.push(OpenLot {
                    deal_id: fill.deal_id.clone(),
                    trade_time: fill.trade_time,
                    price: fill.price,
                    original_qty: fill.qty,
                    remaining_qty: fill.qty,
                    fee: fill.fee,
                }),
                TradeSide::Sell => {
                    self.consume_sell(&key, stack, fill, &mut outcome);
                }
            }
        }

        outcome.open_qty = stacks
            .iter()
            .flat_map(|(_, s)| s.iter())
            .map(|lot| lot.remaining_qty)
            .sum();
        outcome
    }

    fn consume_sell(
        &self,
        key: &QueueKey,
        stack: &mut Vec<OpenLot>,
        sell: &TradeFill,
        outcome: &mut PairingOutcome,
    ) {
        let multiplier = match key.instrument {
            Instrument::Option => self.multipliers.option_multiplier(key.market, &key.code),
            Instrument::Stock => Decimal::ONE,
        };

        let mut remaining = sell.qty;
        while remaining > Decimal::ZERO {
            let Some(lot) = stack.last_mut() else { break };

            let matched = lot.remaining_qty.min(remaining);
            // Fees shared pro rata across the matched quantity.
            let entry_fee = if lot.original_qty > Decimal::ZERO {
                lot.fee * matched / lot.original_qty
            } else {
                Decimal::ZERO
            };
            let exit_fee = if sell.qty > Decimal::ZERO {
                sell.fee * matched / sell.qty
            } else {
                Decimal::ZERO
            };

            let gross = (sell.price - lot.price) * matched * multiplier;
            let fees = entry_fee + exit_fee;
            let net = gross - fees;
            let entry_notional = lot.price * matched * multiplier;
            let pnl_ratio = if entry_notional > Decimal::ZERO {
                net / entry_notional
            } else {
                Decimal::ZERO
            };
            let hold_days = (sell.trade_time.date_naive() - lot.trade_time.date_naive()).num_days();

            outcome.round_trips.push(RoundTrip {
                account_id: sell.account_id,
                market: key.market,
                code: key.code.clone(),
                instrument: key.instrument,
                qty: matched,
                entry_time: lot.trade_time,
                exit_time: sell.trade_time,
                entry_price: lot.price,
                exit_price: sell.price,
                gross_pnl: gross,
                fees,
                net_pnl: net,
                pnl_ratio,
                hold_days,
                entry_deal_ids: vec![lot.deal_id.clone()],
                exit_deal_ids: vec![sell.deal_id.clone()],
            });

            lot.remaining_qty -= matched;
            remaining -= matched;
            if lot.remaining_qty <= Decimal::ZERO {
                stack.pop();
            }
        }

        if remaining > Decimal::ZERO {
            outcome.residuals.push(Residual {
                account_id: sell.account_id,
                market: key.market,
                code: key.code.clone(),
                instrument: key.instrument,
                deal_id: sell.deal_id.clone(),
                qty: remaining,
                price: sell.price,
            });
        }
    }
}
