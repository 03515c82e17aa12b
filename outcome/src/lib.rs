//! Outcome Tracker: asynchronous, closed-loop measurement of what actually
//! happened after a signal fired, independent of whether a position was
//! opened for it.
#[macro_use]
extern crate tracing;

mod error;
pub mod tracker;
pub mod types;

pub use error::{Error, Result};
pub use tracker::OutcomeTracker;
pub use types::{SignalOutcome, Verdict};
