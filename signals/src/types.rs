//! The `Signal` shape every detector implementation produces.
use broker_core::types::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DivergenceType {
    BullishRegular,
    BearishRegular,
    BullishHidden,
    BearishHidden,
}

impl DivergenceType {
    /// Regular divergences signal a reversal; hidden divergences signal a
    /// continuation of the prevailing trend (GLOSSARY).
    pub fn direction(self) -> SignalDirection {
        match self {
            DivergenceType::BullishRegular | DivergenceType::BullishHidden => SignalDirection::Long,
            DivergenceType::BearishRegular | DivergenceType::BearishHidden => SignalDirection::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SignalDirection {
    Long,
    Short,
}

impl SignalDirection {
    pub fn opposite(self) -> Self {
        match self {
            SignalDirection::Long => SignalDirection::Short,
            SignalDirection::Short => SignalDirection::Long,
        }
    }

    pub fn sign(self) -> Decimal {
        match self {
            SignalDirection::Long => Decimal::ONE,
            SignalDirection::Short => -Decimal::ONE,
        }
    }
}

/// Output of a detector invocation for one `(symbol, timeframe)` cycle
///. `divergence_detected = false` means every optional field
/// is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub divergence_detected: bool,
    pub divergence_type: Option<DivergenceType>,
    pub direction: Option<SignalDirection>,
    pub confidence: f64,
    pub entry_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit_1: Option<Decimal>,
    pub take_profit_2: Option<Decimal>,
    pub take_profit_3: Option<Decimal>,
    pub indicator: String,
    pub confirming_indicators: BTreeSet<String>,
    pub swing_length_bars: u32,
    pub divergence_magnitude: f64,
    pub reasoning: String,
}

impl Signal {
    /// The "nothing found" result a detector returns when no divergence
    /// pattern survives the confluence/trend/volume filters.
    pub fn none(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            divergence_detected: false,
            divergence_type: None,
            direction: None,
            confidence: 0.0,
            entry_price: None,
            stop_loss: None,
            take_profit_1: None,
            take_profit_2: None,
            take_profit_3: None,
            indicator: String::new(),
            confirming_indicators: BTreeSet::new(),
            swing_length_bars: 0,
            divergence_magnitude: 0.0,
            reasoning: String::new(),
        }
    }
}
