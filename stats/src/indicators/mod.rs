pub mod adx;
pub mod atr;
pub mod cci;
pub mod cross;
pub mod ema;
pub mod macd;
pub mod mfi;
pub mod obv;
pub mod patterns;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod williams_r;

use crate::types::{IndicatorPeriods, IndicatorSet};
use broker_core::types::Candle;
use rust_decimal::prelude::ToPrimitive;

/// Computes the full indicator set from an oldest-to-newest candle window
///. Warmup entries are `None`; `closes`/`highs`/`lows`/
/// `volumes` are always fully populated.
pub fn compute(candles: &[Candle], periods: &IndicatorPeriods) -> IndicatorSet {
    let opens: Vec<f64> = candles.iter().map(|c| c.open.to_f64().unwrap_or(0.0)).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low.to_f64().unwrap_or(0.0)).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close.to_f64().unwrap_or(0.0)).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume.to_f64().unwrap_or(0.0)).collect();

    let (macd_line, macd_sig, macd_hist) = macd::macd(&closes, periods.macd_fast, periods.macd_slow, periods.macd_signal);
    let (stoch_k, stoch_d) = stochastic::stochastic(&highs, &lows, &closes, periods.stoch_period, periods.stoch_smooth_k, periods.stoch_smooth_d);

    IndicatorSet {
        rsi: rsi::rsi(&closes, periods.rsi),
        macd_line,
        macd_signal: macd_sig,
        macd_histogram: macd_hist,
        obv: obv::obv(&closes, &volumes),
        mfi: mfi::mfi(&highs, &lows, &closes, &volumes, periods.mfi),
        stoch_k,
        stoch_d,
        cci: cci::cci(&highs, &lows, &closes, periods.cci),
        williams_r: williams_r::williams_r(&highs, &lows, &closes, periods.williams_r),
        atr: atr::atr(&highs, &lows, &closes, periods.atr),
        adx: adx::adx(&highs, &lows, &closes, periods.adx),
        ema_short: ema::ema_series(&closes, periods.ema_short),
        ema_medium: ema::ema_series(&closes, periods.ema_medium),
        ema_long: ema::ema_series(&closes, periods.ema_long),
        volume_sma: sma::sma(&volumes, periods.volume_sma),
        candle_patterns: patterns::compute_patterns(&opens, &highs, &lows, &closes),
        closes,
        highs,
        lows,
        volumes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn candle(close: f64) -> Candle {
        Candle {
            open_time: Utc::now(),
            open: Decimal::from_str(&close.to_string()).unwrap(),
            high: Decimal::from_str(&(close + 0.5).to_string()).unwrap(),
            low: Decimal::from_str(&(close - 0.5).to_string()).unwrap(),
            close: Decimal::from_str(&close.to_string()).unwrap(),
            volume: Decimal::from_str("100").unwrap(),
        }
    }

    #[test]
    fn compute_produces_equal_length_series() {
        let candles: Vec<Candle> = (0..250).map(|i| candle(100.0 + i as f64 * 0.1)).collect();
        let set = compute(&candles, &IndicatorPeriods::default());
        assert_eq!(set.len(), candles.len());
        assert_eq!(set.rsi.len(), candles.len());
        assert_eq!(set.ema_long.len(), candles.len());
        assert!(set.rsi[0].is_none());
        assert!(set.rsi.last().unwrap().is_some());
    }
}
