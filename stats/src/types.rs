//! The output shape of the indicator engine.
use std::collections::HashMap;

/// Periods for each indicator. Defaults match the usual textbook settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub stoch_period: usize,
    pub stoch_smooth_k: usize,
    pub stoch_smooth_d: usize,
    pub mfi: usize,
    pub atr: usize,
    pub adx: usize,
    pub cci: usize,
    pub williams_r: usize,
    pub ema_short: usize,
    pub ema_medium: usize,
    pub ema_long: usize,
    pub volume_sma: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            stoch_period: 14,
            stoch_smooth_k: 3,
            stoch_smooth_d: 3,
            mfi: 14,
            atr: 14,
            adx: 14,
            cci: 20,
            williams_r: 14,
            ema_short: 20,
            ema_medium: 50,
            ema_long: 200,
            volume_sma: 20,
        }
    }
}

/// A single candle pattern's reading at a bar: `+100` bullish, `-100`
/// bearish, `0` no pattern.
pub type CandlePatternSignal = i32;

/// Parallel indicator sequences over a candle window, one entry per candle.
/// Warmup entries are `None` ("missing"); `closes`/`highs`/`lows`/`volumes`
/// are always populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<f64>,

    pub rsi: Vec<Option<f64>>,
    pub macd_line: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
    pub obv: Vec<Option<f64>>,
    pub mfi: Vec<Option<f64>>,
    pub stoch_k: Vec<Option<f64>>,
    pub stoch_d: Vec<Option<f64>>,
    pub cci: Vec<Option<f64>>,
    pub williams_r: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
    pub adx: Vec<Option<f64>>,
    pub ema_short: Vec<Option<f64>>,
    pub ema_medium: Vec<Option<f64>>,
    pub ema_long: Vec<Option<f64>>,
    pub volume_sma: Vec<Option<f64>>,

    pub candle_patterns: HashMap<String, Vec<CandlePatternSignal>>,
}

impl IndicatorSet {
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Last non-missing value of a series, skipping warmup entries —
    /// downstream code must always skip missing rather than treat it as zero.
    pub fn last_present(series: &[Option<f64>]) -> Option<f64> {
        series.iter().rev().find_map(|v| *v)
    }

    pub fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
        series.get(index).copied().flatten()
    }
}
