//! Validator: a synchronous, re-orderable chain of
//! independent rules over `(Signal, IndicatorSet, Settings)`. The first
//! failing rule is the rejection reason.
use crate::types::{Signal, SignalDirection};
use broker_core::instrument::AssetClass;
use broker_core::types::Timeframe;
use rust_decimal::prelude::ToPrimitive;
use stats::IndicatorSet;

#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    pub min_confidence: f64,
    pub min_risk_reward: f64,
    pub min_confirming_indicators: usize,
    pub min_swing_bars_4h: u32,
    pub min_swing_bars_1h: u32,
    pub min_magnitude_rsi: f64,
    pub volume_low_threshold: f64,
    pub candle_gate_lookback: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            min_risk_reward: 1.5,
            min_confirming_indicators: 2,
            min_swing_bars_4h: 10,
            min_swing_bars_1h: 5,
            min_magnitude_rsi: 2.0,
            volume_low_threshold: 0.5,
            candle_gate_lookback: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub validated: bool,
    pub reason: String,
}

impl ValidationResult {
    fn ok() -> Self {
        Self { validated: true, reason: "ok".to_string() }
    }
    fn reject(reason: impl Into<String>) -> Self {
        Self { validated: false, reason: reason.into() }
    }
}

const BULLISH_PATTERNS: [&str; 4] = ["hammer", "engulfing", "morning_star", "piercing"];
const BEARISH_PATTERNS: [&str; 4] = ["hanging_man", "engulfing", "evening_star", "dark_cloud_cover"];

/// Applies every rule in order. Pure and synchronous;
/// each rule only reads its own inputs, so the set is safe to re-order.
pub fn validate(signal: &Signal, indicators: &IndicatorSet, config: &ValidatorConfig, asset_class: AssetClass) -> ValidationResult {
    let Some(direction) = signal.direction else {
        return ValidationResult::reject("direction missing");
    };

    if signal.confidence < config.min_confidence {
        return ValidationResult::reject("confidence below minimum");
    }

    let (Some(entry), Some(stop), Some(tp1)) = (
        signal.entry_price.and_then(|d| d.to_f64()),
        signal.stop_loss.and_then(|d| d.to_f64()),
        signal.take_profit_1.and_then(|d| d.to_f64()),
    ) else {
        return ValidationResult::reject("required levels missing");
    };

    match direction {
        SignalDirection::Long if stop >= entry || tp1 <= entry => {
            return ValidationResult::reject("stop side invalid for long");
        }
        SignalDirection::Short if stop <= entry || tp1 >= entry => {
            return ValidationResult::reject("stop side invalid for short");
        }
        _ => {}
    }

    let risk = (entry - stop).abs();
    if risk == 0.0 || (tp1 - entry).abs() / risk < config.min_risk_reward - 0.01 {
        return ValidationResult::reject("risk:reward below minimum");
    }

    if let Some(last_rsi) = IndicatorSet::last_present(&indicators.rsi) {
        match direction {
            SignalDirection::Long if last_rsi > 80.0 => return ValidationResult::reject("RSI contradicts long"),
            SignalDirection::Short if last_rsi < 20.0 => return ValidationResult::reject("RSI contradicts short"),
            _ => {}
        }
    }

    if let Some(last_atr) = IndicatorSet::last_present(&indicators.atr) {
        if last_atr > 0.0 {
            let ratio = risk / last_atr;
            if !(0.5..=5.0).contains(&ratio) {
                return ValidationResult::reject("stop distance outside ATR band");
            }
        }
    }

    let last_adx = IndicatorSet::last_present(&indicators.adx);

    if asset_class == AssetClass::Crypto {
        if let Some(adx) = last_adx {
            if adx < 20.0 {
                return ValidationResult::reject("crypto ADX below minimum trend strength");
            }
        }
    }

    if let Some(adx) = last_adx {
        let n = indicators.ema_long.len();
        if adx < 25.0 && n > 10 {
            if let (Some(now), Some(then)) = (
                IndicatorSet::value_at(&indicators.ema_long, n - 1),
                IndicatorSet::value_at(&indicators.ema_long, n - 11),
            ) {
                if then != 0.0 && (now - then).abs() / then.abs() * 100.0 < 0.05 {
                    return ValidationResult::reject("ranging market");
                }
            }
        }
    }

    if signal.confirming_indicators.len() < config.min_confirming_indicators {
        return ValidationResult::reject("insufficient confirming oscillators");
    }

    let min_swing = match signal.timeframe {
        Timeframe::H4 => config.min_swing_bars_4h,
        _ => config.min_swing_bars_1h,
    };
    if signal.swing_length_bars < min_swing {
        return ValidationResult::reject("swing length too short");
    }

    if signal.indicator == "rsi" && signal.divergence_magnitude < config.min_magnitude_rsi {
        return ValidationResult::reject("RSI divergence magnitude too small");
    }

    let n = indicators.volumes.len();
    if n >= 3 {
        let last_three = &indicators.volumes[(n - 3)..];
        let vol_sma = IndicatorSet::last_present(&indicators.volume_sma).unwrap_or(0.0);
        if last_three.iter().any(|v| *v == 0.0) || last_three.iter().cloned().fold(0.0, f64::max) < vol_sma * 0.01 {
            return ValidationResult::reject("zero or negligible volume");
        }
        if let Some(last_vol) = indicators.volumes.last().copied() {
            if vol_sma > 0.0 && last_vol < config.volume_low_threshold * vol_sma {
                return ValidationResult::reject("volume below low threshold");
            }
        }
    }

    let patterns = match direction {
        SignalDirection::Long => &BULLISH_PATTERNS[..],
        SignalDirection::Short => &BEARISH_PATTERNS[..],
    };
    if !candle_gate_passes(indicators, patterns, direction, config.candle_gate_lookback) {
        return ValidationResult::reject("no confirming reversal pattern in lookback window");
    }

    ValidationResult::ok()
}

fn candle_gate_passes(indicators: &IndicatorSet, patterns: &[&str], direction: SignalDirection, lookback: usize) -> bool {
    let n = indicators.closes.len();
    if n == 0 {
        return false;
    }
    let start = n.saturating_sub(lookback);
    for name in patterns {
        let Some(series) = indicators.candle_patterns.get(*name) else { continue };
        for value in &series[start..n] {
            let matches = match direction {
                SignalDirection::Long => *value > 0,
                SignalDirection::Short => *value < 0,
            };
            if matches {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DivergenceType;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;
    use std::str::FromStr;

    fn base_signal() -> Signal {
        let mut s = Signal::none("BTC/USDT", Timeframe::H1);
        s.direction = Some(SignalDirection::Long);
        s.divergence_type = Some(DivergenceType::BullishRegular);
        s.confidence = 0.85;
        s.entry_price = Some(Decimal::from_str("100").unwrap());
        s.stop_loss = Some(Decimal::from_str("95").unwrap());
        s.take_profit_1 = Some(Decimal::from_str("110").unwrap());
        s.confirming_indicators = BTreeSet::from(["rsi".to_string(), "mfi".to_string()]);
        s.swing_length_bars = 12;
        s.divergence_magnitude = 5.0;
        s.indicator = "rsi".to_string();
        s
    }

    fn indicators_with_pattern(pattern: &str, sign: i32) -> IndicatorSet {
        let mut set = IndicatorSet::default();
        set.closes = vec![100.0; 30];
        set.highs = vec![101.0; 30];
        set.lows = vec![99.0; 30];
        set.volumes = vec![1000.0; 30];
        set.rsi = vec![Some(40.0); 30];
        set.atr = vec![Some(2.0); 30];
        set.adx = vec![Some(30.0); 30];
        set.ema_long = (0..30).map(|i| Some(90.0 + i as f64 * 0.5)).collect();
        set.volume_sma = vec![Some(900.0); 30];
        set.candle_patterns.insert(pattern.to_string(), {
            let mut v = vec![0; 30];
            v[29] = sign;
            v
        });
        set
    }

    #[test]
    fn accepts_a_well_formed_long_signal() {
        let signal = base_signal();
        let indicators = indicators_with_pattern("hammer", 100);
        let result = validate(&signal, &indicators, &ValidatorConfig::default(), AssetClass::Forex);
        assert!(result.validated, "{}", result.reason);
    }

    #[test]
    fn rejects_missing_direction() {
        let mut signal = base_signal();
        signal.direction = None;
        let indicators = indicators_with_pattern("hammer", 100);
        let result = validate(&signal, &indicators, &ValidatorConfig::default(), AssetClass::Forex);
        assert!(!result.validated);
        assert_eq!(result.reason, "direction missing");
    }

    #[test]
    fn rejects_when_rsi_contradicts_long() {
        let signal = base_signal();
        let mut indicators = indicators_with_pattern("hammer", 100);
        indicators.rsi = vec![Some(85.0); 30];
        let result = validate(&signal, &indicators, &ValidatorConfig::default(), AssetClass::Forex);
        assert!(!result.validated);
        assert_eq!(result.reason, "RSI contradicts long");
    }

    #[test]
    fn rejects_ranging_market() {
        let signal = base_signal();
        let mut indicators = indicators_with_pattern("hammer", 100);
        indicators.adx = vec![Some(20.0); 30];
        indicators.ema_long = vec![Some(100.0); 30];
        let result = validate(&signal, &indicators, &ValidatorConfig::default(), AssetClass::Forex);
        assert!(!result.validated);
        assert_eq!(result.reason, "ranging market");
    }

    #[test]
    fn rejects_crypto_signal_on_weak_adx() {
        let signal = base_signal();
        let mut indicators = indicators_with_pattern("hammer", 100);
        indicators.adx = vec![Some(15.0); 30];
        let result = validate(&signal, &indicators, &ValidatorConfig::default(), AssetClass::Crypto);
        assert!(!result.validated);
        assert_eq!(result.reason, "crypto ADX below minimum trend strength");
    }

    #[test]
    fn rejects_when_no_gating_pattern_present() {
        let signal = base_signal();
        let mut indicators = indicators_with_pattern("hammer", 0);
        indicators.candle_patterns.clear();
        let result = validate(&signal, &indicators, &ValidatorConfig::default(), AssetClass::Forex);
        assert!(!result.validated);
        assert_eq!(result.reason, "no confirming reversal pattern in lookback window");
    }
}
