//! Risk Manager: admission control, position sizing, and circuit breakers
//! over the reconstructed portfolio.
#[macro_use]
extern crate serde;
#[macro_use]
extern crate tracing;

mod error;
pub mod portfolio;
pub mod risk;
pub mod types;

pub use error::{Error, Result};
pub use risk::RiskManager;
pub use types::{default_correlation_limits, CircuitBreakerState, PortfolioState, RiskConfig};
