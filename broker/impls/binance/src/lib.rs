//! Binance spot market adapter.
#[macro_use]
extern crate tracing;

mod adapter;
mod convert;

pub use adapter::BinanceBroker;
