#[macro_use]
extern crate tracing;

pub mod alerts;
pub mod ser;
pub mod time;
pub mod tracing_setup;
