mod mem;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb;

use crate::error::*;
use ext::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub use mem::MemoryKVStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb::RocksDbStorage;

/// Raw byte-oriented key/value storage, one logical "table" per persisted row type
///. Never holds a
/// connection pool directly — that bootstrap is external infrastructure.
pub trait Storage: Send + Sync + std::fmt::Debug {
    fn ensure_table(&self, table: &str) -> Result<()>;
    fn put_raw(&self, table: &str, key: &str, value: &[u8]) -> Result<()>;
    fn get_raw(&self, table: &str, key: &str) -> Result<Vec<u8>>;
    fn get_all_raw(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>>;
    fn delete_raw(&self, table: &str, key: &str) -> Result<()>;
}

/// Typed JSON layer over [`Storage`], the only way components touch persistence.
/// Components never serialize by hand.
pub trait StorageExt {
    fn put<V: Serialize>(&self, table: &str, key: &str, value: &V) -> Result<()>;
    fn get<V: DeserializeOwned>(&self, table: &str, key: &str) -> Result<V>;
    fn get_all<V: DeserializeOwned>(&self, table: &str) -> Result<Vec<(String, V)>>;
    fn delete(&self, table: &str, key: &str) -> Result<()>;
}

impl<T: Storage + ?Sized> StorageExt for T {
    fn put<V: Serialize>(&self, table: &str, key: &str, value: &V) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_raw(table, key, &bytes)
    }

    fn get<V: DeserializeOwned>(&self, table: &str, key: &str) -> Result<V> {
        let bytes = self.get_raw(table, key)?;
        serde_json::from_slice(&bytes).err_into()
    }

    fn get_all<V: DeserializeOwned>(&self, table: &str) -> Result<Vec<(String, V)>> {
        self.get_all_raw(table)?
            .into_iter()
            .map(|(k, v)| serde_json::from_slice::<V>(&v).err_into().map(|v| (k, v)))
            .collect()
    }

    fn delete(&self, table: &str, key: &str) -> Result<()> { self.delete_raw(table, key) }
}

/// Where a [`Storage`] instance keeps its data. `Memory` is the `dev`/test default;
/// `RocksDb` is the durable option for `paper`/`live` deployments.
#[derive(Debug, Clone)]
pub enum DbOptions {
    Memory,
    #[cfg(feature = "rocksdb-backend")]
    RocksDb { path: std::path::PathBuf },
}

impl DbOptions {
    pub fn memory() -> Self { DbOptions::Memory }

    #[cfg(feature = "rocksdb-backend")]
    pub fn rocksdb(path: impl Into<std::path::PathBuf>) -> Self {
        DbOptions::RocksDb { path: path.into() }
    }
}

/// Opens (or creates) a [`Storage`] backend with the given tables pre-declared.
pub fn get_or_create(opts: &DbOptions, tables: &[&str]) -> Result<Arc<dyn Storage>> {
    match opts {
        DbOptions::Memory => {
            let store = MemoryKVStore::new();
            for t in tables {
                store.ensure_table(t)?;
            }
            Ok(Arc::new(store))
        }
        #[cfg(feature = "rocksdb-backend")]
        DbOptions::RocksDb { path } => {
            let store = RocksDbStorage::open(path, tables)?;
            Ok(Arc::new(store))
        }
    }
}
