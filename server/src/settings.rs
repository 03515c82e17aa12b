//! Process configuration: one YAML file per environment, a
//! `config/local.yaml` override, then a `TRADER_` prefixed env var override.
use account::RiskConfig;
use broker_core::instrument::AssetClass;
use broker_core::types::Timeframe;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use stats::IndicatorPeriods;
use std::collections::HashMap;
use std::str::FromStr;
use trading::types::TradingMode;

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    pub kind: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default = "default_starting_equity")]
    pub starting_equity: Decimal,
    #[serde(default)]
    pub max_open_positions: Option<usize>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub min_risk_reward: Option<f64>,
    #[serde(default)]
    pub max_correlation_exposure: Option<usize>,
    #[serde(default)]
    pub instruments: Vec<InstrumentSettings>,
}

fn default_starting_equity() -> Decimal {
    Decimal::from(10_000)
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentSettings {
    pub symbol: String,
    pub asset_class: String,
    pub pip_size: Decimal,
    pub pip_value_per_unit: Decimal,
    pub min_units: Decimal,
    pub max_leverage: Decimal,
    pub taker_fee_rate: Decimal,
    pub base_currency: String,
    pub quote_currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    #[serde(default = "default_daily_loss_pct")]
    pub max_daily_loss_pct: Decimal,
    #[serde(default = "default_drawdown_pct")]
    pub max_drawdown_pct: Decimal,
    #[serde(default = "default_position_pct")]
    pub max_position_pct: Decimal,
    #[serde(default = "default_leverage")]
    pub max_leverage: Decimal,
    #[serde(default)]
    pub correlation_limits: HashMap<String, usize>,
    #[serde(default = "default_max_open_positions")]
    pub default_max_open_positions: usize,
}

fn default_daily_loss_pct() -> Decimal { Decimal::from(3) }
fn default_drawdown_pct() -> Decimal { Decimal::from(10) }
fn default_position_pct() -> Decimal { Decimal::from(1) }
fn default_leverage() -> Decimal { Decimal::from(20) }
fn default_max_open_positions() -> usize { 10 }

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: default_daily_loss_pct(),
            max_drawdown_pct: default_drawdown_pct(),
            max_position_pct: default_position_pct(),
            max_leverage: default_leverage(),
            correlation_limits: HashMap::new(),
            default_max_open_positions: default_max_open_positions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorSettings {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_min_rr")]
    pub min_risk_reward: f64,
    #[serde(default = "default_min_confirming")]
    pub min_confirming_indicators: usize,
    #[serde(default = "default_swing_4h")]
    pub min_swing_bars_4h: u32,
    #[serde(default = "default_swing_1h")]
    pub min_swing_bars_1h: u32,
    #[serde(default = "default_min_magnitude")]
    pub min_divergence_magnitude_rsi: f64,
    #[serde(default = "default_volume_threshold")]
    pub volume_low_threshold: f64,
    #[serde(default = "default_gate_lookback")]
    pub candle_gate_lookback: usize,
}

fn default_min_confidence() -> f64 { 0.6 }
fn default_min_rr() -> f64 { 1.5 }
fn default_min_confirming() -> usize { 2 }
fn default_swing_4h() -> u32 { 10 }
fn default_swing_1h() -> u32 { 5 }
fn default_min_magnitude() -> f64 { 2.0 }
fn default_volume_threshold() -> f64 { 0.5 }
fn default_gate_lookback() -> usize { 5 }

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            min_risk_reward: default_min_rr(),
            min_confirming_indicators: default_min_confirming(),
            min_swing_bars_4h: default_swing_4h(),
            min_swing_bars_1h: default_swing_1h(),
            min_divergence_magnitude_rsi: default_min_magnitude(),
            volume_low_threshold: default_volume_threshold(),
            candle_gate_lookback: default_gate_lookback(),
        }
    }
}

impl ValidatorSettings {
    pub fn to_validator_config(&self) -> signals::ValidatorConfig {
        signals::ValidatorConfig {
            min_confidence: self.min_confidence,
            min_risk_reward: self.min_risk_reward,
            min_confirming_indicators: self.min_confirming_indicators,
            min_swing_bars_4h: self.min_swing_bars_4h,
            min_swing_bars_1h: self.min_swing_bars_1h,
            min_magnitude_rsi: self.min_divergence_magnitude_rsi,
            volume_low_threshold: self.volume_low_threshold,
            candle_gate_lookback: self.candle_gate_lookback,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiTfSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_setup_expiry_hours")]
    pub setup_expiry_hours: i64,
}

fn default_setup_expiry_hours() -> i64 { 8 }

impl Default for MultiTfSettings {
    fn default() -> Self {
        Self { enabled: false, setup_expiry_hours: default_setup_expiry_hours() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 { 8080 }

impl Default for ApiSettings {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub trading_mode: TradingMode,
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    #[serde(default = "default_analysis_interval")]
    pub analysis_interval_minutes: u64,
    #[serde(default = "default_lookback_candles")]
    pub lookback_candles: usize,
    #[serde(default = "default_payload_lookback")]
    pub payload_lookback: usize,
    #[serde(default)]
    pub indicator_periods: IndicatorPeriodsSettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub validator: ValidatorSettings,
    #[serde(default)]
    pub multi_tf: MultiTfSettings,
    #[serde(default)]
    pub tp1_close_pct: Decimal,
    #[serde(default)]
    pub api: ApiSettings,
    pub brokers: HashMap<String, BrokerSettings>,
}

fn default_analysis_interval() -> u64 { 5 }
fn default_lookback_candles() -> usize { 300 }
fn default_payload_lookback() -> usize { 50 }

/// Mirrors `stats::IndicatorPeriods` field-for-field so config files can
/// override a subset; unset fields fall back to `IndicatorPeriods::default()`.
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorPeriodsSettings {
    #[serde(default)]
    pub rsi: Option<usize>,
    #[serde(default)]
    pub macd_fast: Option<usize>,
    #[serde(default)]
    pub macd_slow: Option<usize>,
    #[serde(default)]
    pub macd_signal: Option<usize>,
    #[serde(default)]
    pub stoch_period: Option<usize>,
    #[serde(default)]
    pub mfi: Option<usize>,
    #[serde(default)]
    pub atr: Option<usize>,
    #[serde(default)]
    pub adx: Option<usize>,
}

impl Default for IndicatorPeriodsSettings {
    fn default() -> Self {
        Self {
            rsi: None,
            macd_fast: None,
            macd_slow: None,
            macd_signal: None,
            stoch_period: None,
            mfi: None,
            atr: None,
            adx: None,
        }
    }
}

impl IndicatorPeriodsSettings {
    pub fn to_periods(&self) -> IndicatorPeriods {
        let defaults = IndicatorPeriods::default();
        IndicatorPeriods {
            rsi: self.rsi.unwrap_or(defaults.rsi),
            macd_fast: self.macd_fast.unwrap_or(defaults.macd_fast),
            macd_slow: self.macd_slow.unwrap_or(defaults.macd_slow),
            macd_signal: self.macd_signal.unwrap_or(defaults.macd_signal),
            stoch_period: self.stoch_period.unwrap_or(defaults.stoch_period),
            mfi: self.mfi.unwrap_or(defaults.mfi),
            atr: self.atr.unwrap_or(defaults.atr),
            adx: self.adx.unwrap_or(defaults.adx),
            ..defaults
        }
    }
}

impl Settings {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_file = format!("config/{env}.yaml");
        let builder = Config::builder()
            .add_source(File::with_name(&config_file))
            .add_source(File::with_name("config/local.yaml").required(false))
            .add_source(Environment::with_prefix("TRADER").separator("__"));
        builder.build()?.try_deserialize()
    }

    pub fn to_risk_config(&self) -> RiskConfig {
        let mut correlation_limits = account::default_correlation_limits();
        for (name, limit) in &self.risk.correlation_limits {
            if let Ok(class) = AssetClass::from_str(name) {
                correlation_limits.insert(class, *limit);
            }
        }

        let mut starting_equity = HashMap::new();
        let mut max_open_positions = HashMap::new();
        let mut correlation_exposure_overrides = HashMap::new();
        for (broker_id, broker) in &self.brokers {
            starting_equity.insert(broker_id.clone(), broker.starting_equity);
            if let Some(cap) = broker.max_open_positions {
                max_open_positions.insert(broker_id.clone(), cap);
            }
            if let Some(cap) = broker.max_correlation_exposure {
                correlation_exposure_overrides.insert(broker_id.clone(), cap);
            }
        }

        RiskConfig {
            max_daily_loss_pct: self.risk.max_daily_loss_pct,
            max_drawdown_pct: self.risk.max_drawdown_pct,
            max_position_pct: self.risk.max_position_pct,
            max_leverage: self.risk.max_leverage,
            correlation_limits,
            starting_equity,
            max_open_positions,
            default_starting_equity: default_starting_equity(),
            default_max_open_positions: self.risk.default_max_open_positions,
            correlation_exposure_overrides,
        }
    }

    /// A configured broker-level minimum confidence/risk-reward only ever
    /// raises the bar above the global validator default, never lowers it.
    pub fn min_confidence_for(&self, broker_id: &str) -> f64 {
        self.brokers.get(broker_id).and_then(|b| b.min_confidence).unwrap_or(self.validator.min_confidence)
    }

    pub fn min_risk_reward_for(&self, broker_id: &str) -> f64 {
        self.brokers.get(broker_id).and_then(|b| b.min_risk_reward).unwrap_or(self.validator.min_risk_reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_periods_fall_back_to_defaults_when_unset() {
        let settings = IndicatorPeriodsSettings::default();
        let periods = settings.to_periods();
        assert_eq!(periods.rsi, IndicatorPeriods::default().rsi);
    }

    #[test]
    fn risk_settings_default_matches_documented_thresholds() {
        let risk = RiskSettings::default();
        assert_eq!(risk.max_daily_loss_pct, Decimal::from(3));
        assert_eq!(risk.max_drawdown_pct, Decimal::from(10));
    }
}
