//! Convenience re-exports for callers that only need the reconstructed
//! portfolio shape, not the Risk Manager itself.
pub use crate::types::PortfolioState;
