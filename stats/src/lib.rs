#[cfg(test)]
#[macro_use]
extern crate float_cmp;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate thiserror;

pub use ta::{Close, High, Low, Next, Open, Reset, Volume};

mod error;
pub mod indicators;
mod types;

pub use error::Error;
pub use indicators::compute;
pub use types::{CandlePatternSignal, IndicatorPeriods, IndicatorSet};
