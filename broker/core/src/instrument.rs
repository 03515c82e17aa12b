//! Instrument metadata: pip sizing, leverage caps, and asset-class tagging
//! used by position sizing and correlation limits.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AssetClass {
    Crypto,
    Forex,
    Index,
    Commodity,
    Bond,
    Stock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub broker_id: String,
    pub display_name: String,
    pub asset_class: AssetClass,
    /// Smallest meaningful price increment. `0.0001` for most FX pairs,
    /// `0.01` for JPY crosses, `1` (no pip convention) for crypto.
    pub pip_size: Decimal,
    /// Quote-currency value of one pip move for a single unit of base quantity.
    pub pip_value_per_unit: Decimal,
    pub min_units: Decimal,
    pub max_leverage: Decimal,
    pub taker_fee_rate: Decimal,
    pub base_currency: String,
    pub quote_currency: String,
}

impl Instrument {
    /// Synthesizes a permissive default entry for a symbol the registry has
    /// never seen, so the Crypto path never blocks on missing metadata.
    fn synthesize_crypto(broker_id: &str, symbol: &str) -> Self {
        let (base, quote) = symbol.split_once('/').unwrap_or((symbol, "USDT"));
        Instrument {
            symbol: symbol.to_string(),
            broker_id: broker_id.to_string(),
            display_name: symbol.to_string(),
            asset_class: AssetClass::Crypto,
            pip_size: Decimal::from_str("1").unwrap(),
            pip_value_per_unit: Decimal::from_str("1").unwrap(),
            min_units: Decimal::from_str("0.0001").unwrap(),
            max_leverage: Decimal::from_str("1").unwrap(),
            taker_fee_rate: Decimal::from_str("0.001").unwrap(),
            base_currency: base.to_string(),
            quote_currency: quote.to_string(),
        }
    }
}

/// Static lookup table for instrument metadata, keyed `broker_id:symbol`.
/// Populated at startup from configuration; falls back to a synthesized
/// crypto entry for unknown symbols rather than erroring.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    entries: HashMap<String, Instrument>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    fn key(broker_id: &str, symbol: &str) -> String {
        format!("{broker_id}:{symbol}")
    }

    pub fn register(&mut self, instrument: Instrument) {
        let key = Self::key(&instrument.broker_id, &instrument.symbol);
        self.entries.insert(key, instrument);
    }

    pub fn get(&self, broker_id: &str, symbol: &str) -> Instrument {
        self.entries
            .get(&Self::key(broker_id, symbol))
            .cloned()
            .unwrap_or_else(|| Instrument::synthesize_crypto(broker_id, symbol))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_symbol_synthesizes_crypto_entry() {
        let registry = InstrumentRegistry::new();
        let inst = registry.get("binance", "ETH/USDT");
        assert_eq!(inst.asset_class, AssetClass::Crypto);
        assert_eq!(inst.base_currency, "ETH");
        assert_eq!(inst.quote_currency, "USDT");
    }

    #[test]
    fn registered_instrument_is_returned_verbatim() {
        let mut registry = InstrumentRegistry::new();
        registry.register(Instrument {
            symbol: "EUR_USD".into(),
            broker_id: "oanda".into(),
            display_name: "EUR/USD".into(),
            asset_class: AssetClass::Forex,
            pip_size: Decimal::from_str("0.0001").unwrap(),
            pip_value_per_unit: Decimal::from_str("0.0001").unwrap(),
            min_units: Decimal::from_str("1").unwrap(),
            max_leverage: Decimal::from_str("20").unwrap(),
            taker_fee_rate: Decimal::from_str("0").unwrap(),
            base_currency: "EUR".into(),
            quote_currency: "USD".into(),
        });
        let inst = registry.get("oanda", "EUR_USD");
        assert_eq!(inst.asset_class, AssetClass::Forex);
        assert_eq!(inst.max_leverage, Decimal::from_str("20").unwrap());
    }
}
