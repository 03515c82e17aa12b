//! Wire-level value types shared by every broker adapter.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Candle timeframe. Ordering matters for the multi-timeframe setup/trigger
/// confirmation: `4h` must outrank `1h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Timeframe {
    #[strum(serialize = "1m")]
    #[serde(rename = "1m")]
    M1,
    #[strum(serialize = "5m")]
    #[serde(rename = "5m")]
    M5,
    #[strum(serialize = "15m")]
    #[serde(rename = "15m")]
    M15,
    #[strum(serialize = "30m")]
    #[serde(rename = "30m")]
    M30,
    #[strum(serialize = "1h")]
    #[serde(rename = "1h")]
    H1,
    #[strum(serialize = "4h")]
    #[serde(rename = "4h")]
    H4,
    #[strum(serialize = "1d")]
    #[serde(rename = "1d")]
    D1,
    #[strum(serialize = "1w")]
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    /// Nominal candle duration, used to detect gaps and to pick the "closest
    /// candle to target" in the outcome tracker.
    pub fn duration(self) -> chrono::Duration {
        match self {
            Timeframe::M1 => chrono::Duration::minutes(1),
            Timeframe::M5 => chrono::Duration::minutes(5),
            Timeframe::M15 => chrono::Duration::minutes(15),
            Timeframe::M30 => chrono::Duration::minutes(30),
            Timeframe::H1 => chrono::Duration::hours(1),
            Timeframe::H4 => chrono::Duration::hours(4),
            Timeframe::D1 => chrono::Duration::days(1),
            Timeframe::W1 => chrono::Duration::weeks(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "util::ser::date_time_format")]
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub total: Decimal,
    pub free: Decimal,
    pub used: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OrderKind {
    Limit,
    Stop,
}

/// Venue acknowledgement of a submitted order. `filled_quantity`/`avg_price`
/// are `None` until the venue reports a fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub venue_order_id: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub filled_quantity: Option<Decimal>,
    pub avg_fill_price: Option<Decimal>,
    pub submitted_at: DateTime<Utc>,
}
