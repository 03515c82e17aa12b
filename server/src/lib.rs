#[macro_use]
extern crate tracing;

pub mod cycle;
pub mod health;
pub mod scheduler;
pub mod settings;
