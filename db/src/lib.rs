mod error;
mod storage;

pub use error::Error;
pub use storage::{get_or_create, DbOptions, MemoryKVStore, Storage, StorageExt};
#[cfg(feature = "rocksdb-backend")]
pub use storage::RocksDbStorage;
