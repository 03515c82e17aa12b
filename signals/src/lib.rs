//! Signal generation: swing detection, the pluggable divergence detector
//!, and the 15-rule validator chain.
#[macro_use]
extern crate tracing;

pub mod detector;
pub mod swing;
pub mod types;
pub mod validator;

pub use detector::{DeterministicDetector, DeterministicDetectorConfig, DivergenceDetector, ExternalDetector, SignalOracle};
pub use types::{DivergenceType, Signal, SignalDirection};
pub use validator::{validate, ValidationResult, ValidatorConfig};
