#[macro_use]
extern crate tracing;

pub mod error;
pub mod instrument;
pub mod rate_limit;
pub mod retry;
pub mod router;
pub mod session;
pub mod types;

pub use error::{Error, Result};
pub use router::{Broker, BrokerId, BrokerRouter};

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::instrument::{AssetClass, Instrument, InstrumentRegistry};
    pub use crate::rate_limit::{EndpointCategory, RateLimiter};
    pub use crate::router::{Broker, BrokerId, BrokerRouter};
    pub use crate::session::{TokenRefresher, TokenSession};
    pub use crate::types::*;
}
