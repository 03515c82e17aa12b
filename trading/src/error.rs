use crate::types::OrderState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("broker {0}")]
    Broker(#[from] brokers::error::Error),
    #[error("db {0}")]
    Db(#[from] db::Error),
    #[error("illegal order transition from {from:?} to {to:?}")]
    IllegalTransition { from: OrderState, to: OrderState },
    #[error("order {0} not found")]
    OrderNotFound(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, Error>;
