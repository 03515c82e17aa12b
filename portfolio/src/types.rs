//! Risk Manager configuration and reconstructed portfolio state.
use broker_core::instrument::AssetClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use trading::types::Position;

/// Per-asset-class same-direction correlation caps.
pub fn default_correlation_limits() -> HashMap<AssetClass, usize> {
    HashMap::from([
        (AssetClass::Forex, 4),
        (AssetClass::Index, 3),
        (AssetClass::Commodity, 3),
        (AssetClass::Bond, 1),
        (AssetClass::Crypto, 4),
        (AssetClass::Stock, 3),
    ])
}

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub max_daily_loss_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub max_position_pct: Decimal,
    pub max_leverage: Decimal,
    pub correlation_limits: HashMap<AssetClass, usize>,
    pub starting_equity: HashMap<String, Decimal>,
    pub max_open_positions: HashMap<String, usize>,
    pub default_starting_equity: Decimal,
    pub default_max_open_positions: usize,
    /// Per-broker override of `max_correlation_exposure`, applied across
    /// every asset class for that broker. Absent brokers fall back to `correlation_limits`.
    pub correlation_exposure_overrides: HashMap<String, usize>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: Decimal::from_str("3").unwrap(),
            max_drawdown_pct: Decimal::from_str("10").unwrap(),
            max_position_pct: Decimal::from_str("1").unwrap(),
            max_leverage: Decimal::from_str("20").unwrap(),
            correlation_limits: default_correlation_limits(),
            starting_equity: HashMap::new(),
            max_open_positions: HashMap::new(),
            default_starting_equity: Decimal::from(10_000),
            default_max_open_positions: 10,
            correlation_exposure_overrides: HashMap::new(),
        }
    }
}

impl RiskConfig {
    pub fn starting_equity(&self, broker_id: &str) -> Decimal {
        self.starting_equity.get(broker_id).copied().unwrap_or(self.default_starting_equity)
    }

    pub fn get_max_open_positions(&self, broker_id: &str) -> usize {
        self.max_open_positions.get(broker_id).copied().unwrap_or(self.default_max_open_positions)
    }

    /// A broker-level `max_correlation_exposure` override takes priority
    /// over the asset-class default.
    pub fn correlation_limit(&self, broker_id: &str, asset_class: AssetClass) -> usize {
        if let Some(&limit) = self.correlation_exposure_overrides.get(broker_id) {
            return limit;
        }
        self.correlation_limits.get(&asset_class).copied().unwrap_or(3)
    }
}

/// Static quote-to-AUD rate table. A fixed snapshot used for
/// sizing and dashboard display rather than a live feed.
pub fn quote_to_aud_rate(quote_currency: &str) -> Option<Decimal> {
    let rate = match quote_currency {
        "AUD" => "1.0",
        "USD" => "1.52",
        "GBP" => "1.92",
        "EUR" => "1.64",
        "NZD" => "0.91",
        "CAD" => "1.10",
        "CHF" => "1.70",
        "JPY" => "0.0098",
        _ => return None,
    };
    Decimal::from_str(rate).ok()
}

/// Independent daily/drawdown admission gates. Both can be
/// tripped simultaneously; daily resets automatically at UTC midnight,
/// drawdown requires a manual reset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub daily_tripped: bool,
    pub daily_tripped_on: Option<chrono::NaiveDate>,
    pub drawdown_tripped: bool,
}

impl CircuitBreakerState {
    pub fn blocked(&self) -> bool {
        self.daily_tripped || self.drawdown_tripped
    }

    /// Auto-resets the daily breaker at UTC day rollover.
    pub fn maybe_reset_daily(&mut self, today: chrono::NaiveDate) {
        if self.daily_tripped && self.daily_tripped_on.map(|d| d != today).unwrap_or(true) {
            self.daily_tripped = false;
            self.daily_tripped_on = None;
        }
    }

    pub fn trip_daily(&mut self, today: chrono::NaiveDate) {
        self.daily_tripped = true;
        self.daily_tripped_on = Some(today);
    }

    pub fn trip_drawdown(&mut self) {
        self.drawdown_tripped = true;
    }
}

/// Reconstructed from the orders ledger, never held as canonical
/// in-memory state.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub broker_id: String,
    pub total_equity: Decimal,
    pub daily_pnl: Decimal,
    pub open_positions: Vec<Position>,
    pub peak_equity: Decimal,
}
