//! Order lifecycle, Execution Engine, and the `ActiveSetup` store.
#[macro_use]
extern crate tracing;

pub mod active_setup;
pub mod engine;
mod error;
pub mod monitor;
pub mod position;
pub mod types;

pub use error::{Error, Result};
pub use monitor::PositionMonitor;
