use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("json serde error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "rocksdb-backend")]
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("table not found: {0}")]
    UnknownTable(String),
}

pub type Result<T> = core::result::Result<T, Error>;
