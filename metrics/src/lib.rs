#[macro_use]
extern crate tracing;

pub mod error;
pub mod registry;

pub use error::{Error, Result};
pub use registry::Metrics;
