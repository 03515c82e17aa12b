//! Divergence Detector: a pluggable interface with at least
//! two implementations — the deterministic reference detector here, and an
//! external oracle (e.g. an LLM) treated as ordinary retried I/O.
use crate::swing::{last_two, swing_highs, swing_lows};
use crate::types::{DivergenceType, Signal, SignalDirection};
use async_trait::async_trait;
use broker_core::types::Timeframe;
use rust_decimal::Decimal;
use stats::IndicatorSet;
use std::collections::BTreeSet;
use std::str::FromStr;

#[async_trait]
pub trait DivergenceDetector: Send + Sync {
    async fn detect(&self, symbol: &str, timeframe: Timeframe, indicators: &IndicatorSet) -> Signal;
}

#[derive(Debug, Clone, Copy)]
pub struct DeterministicDetectorConfig {
    pub swing_order: usize,
    pub min_confirming_oscillators: usize,
    pub use_trend_filter: bool,
    pub require_volume_confirmation: bool,
    pub volume_confirmation_period: usize,
    pub atr_stop_multiplier: f64,
    pub risk_reward: f64,
}

impl Default for DeterministicDetectorConfig {
    fn default() -> Self {
        Self {
            swing_order: 5,
            min_confirming_oscillators: 2,
            use_trend_filter: true,
            require_volume_confirmation: true,
            volume_confirmation_period: 20,
            atr_stop_multiplier: 1.0,
            risk_reward: 1.5,
        }
    }
}

/// Scans a fixed set of three uncorrelated oscillators — momentum (RSI),
/// trend-momentum (MACD histogram), volume-flow (MFI) — for divergence
/// against the last two price swings.
pub struct DeterministicDetector {
    pub config: DeterministicDetectorConfig,
}

impl DeterministicDetector {
    pub fn new(config: DeterministicDetectorConfig) -> Self {
        Self { config }
    }

    fn oscillator_series<'a>(indicators: &'a IndicatorSet) -> Vec<(&'static str, &'a [Option<f64>])> {
        vec![
            ("rsi", &indicators.rsi),
            ("macd_histogram", &indicators.macd_histogram),
            ("mfi", &indicators.mfi),
        ]
    }

    /// For a given pair of price swing indices, does the oscillator at those
    /// same indices exhibit the matching divergence pattern?
    fn oscillator_confirms(kind: DivergenceType, osc: &[Option<f64>], price_a: f64, price_b: f64, idx_a: usize, idx_b: usize) -> bool {
        let (Some(osc_a), Some(osc_b)) = (osc.get(idx_a).copied().flatten(), osc.get(idx_b).copied().flatten()) else {
            return false;
        };
        match kind {
            DivergenceType::BullishRegular => price_b < price_a && osc_b > osc_a,
            DivergenceType::BearishRegular => price_b > price_a && osc_b < osc_a,
            DivergenceType::BullishHidden => price_b > price_a && osc_b < osc_a,
            DivergenceType::BearishHidden => price_b < price_a && osc_b > osc_a,
        }
    }

    fn trend_allows(&self, direction: SignalDirection, indicators: &IndicatorSet) -> bool {
        if !self.config.use_trend_filter {
            return true;
        }
        let Some(last_close) = indicators.closes.last().copied() else { return true };
        let Some(ema_long) = IndicatorSet::last_present(&indicators.ema_long) else { return true };
        match direction {
            SignalDirection::Long => last_close >= ema_long,
            SignalDirection::Short => last_close <= ema_long,
        }
    }

    fn volume_confirms(&self, indicators: &IndicatorSet) -> bool {
        if !self.config.require_volume_confirmation {
            return true;
        }
        let n = indicators.volumes.len();
        if n == 0 {
            return false;
        }
        let period = self.config.volume_confirmation_period.min(n);
        let avg = indicators.volumes[(n - period)..].iter().sum::<f64>() / period as f64;
        indicators.volumes[n - 1] >= avg
    }

    fn decimal(v: f64) -> Decimal {
        Decimal::from_str(&format!("{v:.8}")).unwrap_or_default()
    }
}

#[async_trait]
impl DivergenceDetector for DeterministicDetector {
    async fn detect(&self, symbol: &str, timeframe: Timeframe, indicators: &IndicatorSet) -> Signal {
        let none = Signal::none(symbol, timeframe);
        if indicators.closes.len() < self.config.swing_order * 2 + 2 {
            return none;
        }

        let highs = swing_highs(&indicators.highs, self.config.swing_order);
        let lows = swing_lows(&indicators.lows, self.config.swing_order);

        for kind in [
            DivergenceType::BullishRegular,
            DivergenceType::BearishRegular,
            DivergenceType::BullishHidden,
            DivergenceType::BearishHidden,
        ] {
            let bullish = matches!(kind, DivergenceType::BullishRegular | DivergenceType::BullishHidden);
            let swings = if bullish { &lows } else { &highs };
            let Some((a, b)) = last_two(swings) else { continue };

            let direction = kind.direction();
            if !self.trend_allows(direction, indicators) {
                continue;
            }

            let mut confirming = BTreeSet::new();
            let mut primary: Option<&str> = None;
            for (name, series) in Self::oscillator_series(indicators) {
                if Self::oscillator_confirms(kind, series, a.value, b.value, a.index, b.index) {
                    confirming.insert(name.to_string());
                    primary.get_or_insert(name);
                }
            }

            if confirming.len() < self.config.min_confirming_oscillators {
                continue;
            }
            if !self.volume_confirms(indicators) {
                continue;
            }

            let Some(last_close) = indicators.closes.last().copied() else { continue };
            let Some(atr) = IndicatorSet::last_present(&indicators.atr) else { continue };
            let swing_length = b.index.saturating_sub(a.index) as u32;
            let magnitude = (b.value - a.value).abs();

            let entry = last_close;
            let stop = match direction {
                SignalDirection::Long => b.value.min(entry) - atr * self.config.atr_stop_multiplier,
                SignalDirection::Short => b.value.max(entry) + atr * self.config.atr_stop_multiplier,
            };
            let risk = (entry - stop).abs();
            if risk <= 0.0 {
                continue;
            }
            let sign = match direction {
                SignalDirection::Long => 1.0,
                SignalDirection::Short => -1.0,
            };
            let tp1 = entry + sign * risk * self.config.risk_reward;
            let tp2 = entry + sign * risk * self.config.risk_reward * 1.5;
            let tp3 = entry + sign * risk * self.config.risk_reward * 2.0;

            let confidence = match confirming.len() {
                0 | 1 => 0.5,
                2 => 0.7,
                _ => 0.9,
            };

            return Signal {
                symbol: symbol.to_string(),
                timeframe,
                divergence_detected: true,
                divergence_type: Some(kind),
                direction: Some(direction),
                confidence,
                entry_price: Some(Self::decimal(entry)),
                stop_loss: Some(Self::decimal(stop)),
                take_profit_1: Some(Self::decimal(tp1)),
                take_profit_2: Some(Self::decimal(tp2)),
                take_profit_3: Some(Self::decimal(tp3)),
                indicator: primary.unwrap_or_default().to_string(),
                confirming_indicators: confirming,
                swing_length_bars: swing_length,
                divergence_magnitude: magnitude,
                reasoning: format!(
                    "{kind} confirmed between swing bars {a} and {b}",
                    kind = kind,
                    a = a.index,
                    b = b.index,
                ),
            };
        }

        none
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::types::Timeframe;

    /// Builds a 30-candle `IndicatorSet` with a regular bullish divergence
    /// baked in: price makes a lower low at bar 20 than bar 8, while RSI,
    /// MACD histogram, and MFI all make higher lows there.
    fn bullish_regular_indicators() -> IndicatorSet {
        let n = 30;
        let mut ind = IndicatorSet {
            closes: vec![50.0; n],
            highs: vec![20.0; n],
            lows: vec![10.0; n],
            volumes: vec![100.0; n],
            rsi: vec![Some(50.0); n],
            macd_histogram: vec![Some(0.0); n],
            mfi: vec![Some(50.0); n],
            atr: vec![Some(1.0); n],
            ema_long: vec![Some(10.0); n],
            ..Default::default()
        };
        ind.lows[8] = 6.0;
        ind.lows[20] = 3.0;
        ind.rsi[8] = Some(30.0);
        ind.rsi[20] = Some(45.0);
        ind.macd_histogram[8] = Some(-1.0);
        ind.macd_histogram[20] = Some(1.0);
        ind.mfi[8] = Some(20.0);
        ind.mfi[20] = Some(60.0);
        ind
    }

    #[tokio::test]
    async fn detects_regular_bullish_divergence_with_full_confluence() {
        let detector = DeterministicDetector::new(DeterministicDetectorConfig::default());
        let signal = detector.detect("BTCUSDT", Timeframe::H4, &bullish_regular_indicators()).await;

        assert!(signal.divergence_detected);
        assert_eq!(signal.divergence_type, Some(DivergenceType::BullishRegular));
        assert_eq!(signal.direction, Some(SignalDirection::Long));
        assert_eq!(signal.confirming_indicators.len(), 3, "rsi, macd_histogram, and mfi all confirm");
        assert_eq!(signal.confidence, 0.9, "3-way confluence is the top confidence tier");
        assert_eq!(signal.swing_length_bars, 12);
        let entry = signal.entry_price.unwrap();
        let stop = signal.stop_loss.unwrap();
        let tp1 = signal.take_profit_1.unwrap();
        assert!(stop < entry, "long stop must sit below entry");
        assert!(tp1 > entry, "long take-profit must sit above entry");
    }

    #[tokio::test]
    async fn too_short_a_history_yields_no_signal() {
        let detector = DeterministicDetector::new(DeterministicDetectorConfig::default());
        let short = IndicatorSet { closes: vec![1.0; 4], ..Default::default() };
        let signal = detector.detect("BTCUSDT", Timeframe::H1, &short).await;
        assert!(!signal.divergence_detected);
    }

    #[tokio::test]
    async fn trend_filter_blocks_a_long_signal_below_ema_long() {
        let mut config = DeterministicDetectorConfig::default();
        config.use_trend_filter = true;
        let detector = DeterministicDetector::new(config);

        let mut indicators = bullish_regular_indicators();
        // Last close now sits well below the long EMA: the hard trend filter
        // must veto the otherwise-valid bullish divergence.
        let last = indicators.closes.len() - 1;
        indicators.closes[last] = 1.0;
        indicators.ema_long = vec![Some(100.0); indicators.ema_long.len()];

        let signal = detector.detect("BTCUSDT", Timeframe::H4, &indicators).await;
        assert!(!signal.divergence_detected);
    }

    #[tokio::test]
    async fn insufficient_confluence_is_rejected() {
        let mut config = DeterministicDetectorConfig::default();
        config.min_confirming_oscillators = 4; // more than the 3 oscillators scanned
        let detector = DeterministicDetector::new(config);
        let signal = detector.detect("BTCUSDT", Timeframe::H4, &bullish_regular_indicators()).await;
        assert!(!signal.divergence_detected);
    }
}

/// Delegates to an off-process oracle (e.g. an LLM) returning the same
/// `Signal` shape. Treated as an ordinary retried, timeout-bounded I/O call
/// rather than a special case in the analysis cycle.
#[async_trait]
pub trait SignalOracle: Send + Sync {
    async fn query(&self, symbol: &str, timeframe: Timeframe, indicators: &IndicatorSet) -> anyhow::Result<Signal>;
}

pub struct ExternalDetector<O: SignalOracle> {
    oracle: O,
}

impl<O: SignalOracle> ExternalDetector<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl<O: SignalOracle + Send + Sync> DivergenceDetector for ExternalDetector<O> {
    async fn detect(&self, symbol: &str, timeframe: Timeframe, indicators: &IndicatorSet) -> Signal {
        match self.oracle.query(symbol, timeframe, indicators).await {
            Ok(signal) => signal,
            Err(err) => {
                warn!(%err, symbol, "external divergence oracle call failed, treating as no signal");
                Signal::none(symbol, timeframe)
            }
        }
    }
}
