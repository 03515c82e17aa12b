use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("broker {0}")]
    Broker(#[from] brokers::error::Error),
    #[error("db {0}")]
    Db(#[from] db::Error),
    #[error("no instrument metadata and no fallback rate for quote currency {0}")]
    UnknownQuoteCurrency(String),
}

pub type Result<T> = std::result::Result<T, Error>;
