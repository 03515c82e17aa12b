use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage: {0}")]
    Storage(#[from] db::Error),

    #[error("broker: {0}")]
    Broker(#[from] broker_core::Error),

    #[error("no candles available to compute outcome for {symbol}")]
    NoCandles { symbol: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
