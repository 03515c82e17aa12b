#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid indicator parameter {name}: expected {expected}, found {found}")]
    InvalidParameter { name: String, expected: String, found: String },
    #[error("not enough candles: need at least {need}, got {got}")]
    InsufficientData { need: usize, got: usize },
}

pub type Result<T> = core::result::Result<T, Error>;
