//! Broker error taxonomy: transient failures are retried by
//! [`crate::retry`], permanent failures are surfaced to the caller unretried.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("rate limited by venue")]
    RateLimited,
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("venue returned a 5xx: {0}")]
    ServerError(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("symbol not supported by this venue: {0}")]
    UnsupportedSymbol(String),
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient failures (network, timeout, rate-limit, 5xx) are retried with
    /// backoff; everything else (4xx validation, auth) is permanent and surfaces
    /// immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::RateLimited | Error::Timeout(_) | Error::ServerError(_)
        )
    }
}

pub type Result<T> = core::result::Result<T, Error>;
