//! The outcome row tracked per signal.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use signals::SignalDirection;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
    #[default]
    Pending,
    Correct,
    Incorrect,
    Partial,
}

/// Forward-observation record for one signal: checkpoint returns, MFE/MAE,
/// sticky TP/SL hits, and the rolling verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalOutcome {
    pub signal_id: Uuid,
    pub symbol: String,
    pub direction: SignalDirection,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit_1: Option<Decimal>,
    pub take_profit_2: Option<Decimal>,
    pub take_profit_3: Option<Decimal>,
    pub signal_created_at: DateTime<Utc>,

    pub price_1h: Option<Decimal>,
    pub price_4h: Option<Decimal>,
    pub price_12h: Option<Decimal>,
    pub price_24h: Option<Decimal>,
    pub return_1h: Option<Decimal>,
    pub return_4h: Option<Decimal>,
    pub return_12h: Option<Decimal>,
    pub return_24h: Option<Decimal>,

    pub max_favorable_price: Option<Decimal>,
    pub max_adverse_price: Option<Decimal>,
    pub max_favorable_pct: Option<Decimal>,
    pub max_adverse_pct: Option<Decimal>,

    pub tp1_hit: bool,
    pub tp1_hit_at: Option<DateTime<Utc>>,
    pub tp2_hit: bool,
    pub tp2_hit_at: Option<DateTime<Utc>>,
    pub tp3_hit: bool,
    pub tp3_hit_at: Option<DateTime<Utc>>,
    pub sl_hit: bool,
    pub sl_hit_at: Option<DateTime<Utc>>,

    pub verdict: Verdict,
    pub fully_resolved: bool,
}

impl SignalOutcome {
    pub fn new(signal_id: Uuid, symbol: impl Into<String>, direction: SignalDirection, entry_price: Decimal, signal_created_at: DateTime<Utc>) -> Self {
        Self {
            signal_id,
            symbol: symbol.into(),
            direction,
            entry_price,
            stop_loss: None,
            take_profit_1: None,
            take_profit_2: None,
            take_profit_3: None,
            signal_created_at,
            price_1h: None,
            price_4h: None,
            price_12h: None,
            price_24h: None,
            return_1h: None,
            return_4h: None,
            return_12h: None,
            return_24h: None,
            max_favorable_price: None,
            max_adverse_price: None,
            max_favorable_pct: None,
            max_adverse_pct: None,
            tp1_hit: false,
            tp1_hit_at: None,
            tp2_hit: false,
            tp2_hit_at: None,
            tp3_hit: false,
            tp3_hit_at: None,
            sl_hit: false,
            sl_hit_at: None,
            verdict: Verdict::Pending,
            fully_resolved: false,
        }
    }
}
