//! Translates between `binance-rs-async`'s REST model and our broker-agnostic types.
use binance::rest_model::KlineSummary;
use broker_core::types::Candle;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

pub fn kline_to_candle(k: &KlineSummary) -> Candle {
    Candle {
        open_time: Utc.timestamp_millis_opt(k.open_time).single().unwrap_or_else(Utc::now),
        open: dec(&k.open),
        high: dec(&k.high),
        low: dec(&k.low),
        close: dec(&k.close),
        volume: dec(&k.volume),
    }
}

/// Binance kline intervals only go down to `1m` and up to `1M`; we clamp the
/// broker-agnostic `Timeframe` to the closest Binance interval string.
pub fn timeframe_to_interval(tf: broker_core::types::Timeframe) -> &'static str {
    use broker_core::types::Timeframe::*;
    match tf {
        M1 => "1m",
        M5 => "5m",
        M15 => "15m",
        M30 => "30m",
        H1 => "1h",
        H4 => "4h",
        D1 => "1d",
        W1 => "1w",
    }
}
