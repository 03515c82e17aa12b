//! Top-level facade: re-exports the venue adapters selected by feature flags
//! and the shared `broker_core` capability set.
#[cfg(feature = "binance")]
pub use broker_binance;
#[cfg(feature = "oanda")]
pub use broker_oanda;

pub use broker_core::*;

pub mod prelude {
    pub use broker_core::prelude::*;
}
