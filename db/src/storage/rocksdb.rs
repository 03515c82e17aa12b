use crate::error::*;
use crate::storage::Storage;
use ext::prelude::*;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use std::path::Path;

#[derive(Debug)]
pub struct RocksDbStorage {
    inner: DB,
}

impl RocksDbStorage {
    pub fn open<P: AsRef<Path>>(db_path: P, tables: &[&str]) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);
        let mut wanted: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        if let Ok(existing) = DB::list_cf(&options, db_path.as_ref()) {
            for cf in existing {
                if !wanted.contains(&cf) {
                    wanted.push(cf);
                }
            }
        }
        let descriptors: Vec<ColumnFamilyDescriptor> = wanted
            .iter()
            .map(|t| ColumnFamilyDescriptor::new(t, Self::default_cf_options()))
            .collect();
        let inner = DB::open_cf_descriptors(&options, db_path, descriptors)?;
        Ok(Self { inner })
    }

    fn default_cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_max_write_buffer_number(4);
        opts
    }

    fn cf(&self, name: &str) -> Result<std::sync::Arc<rocksdb::BoundColumnFamily>> {
        self.inner.cf_handle(name).ok_or_else(|| Error::UnknownTable(name.to_string()))
    }
}

impl Storage for RocksDbStorage {
    fn ensure_table(&self, table: &str) -> Result<()> {
        if self.inner.cf_handle(table).is_none() {
            self.inner.create_cf(table, &Self::default_cf_options())?;
        }
        Ok(())
    }

    fn put_raw(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        let cf = self.cf(table)?;
        self.inner.put_cf(&cf, key, value).err_into()
    }

    fn get_raw(&self, table: &str, key: &str) -> Result<Vec<u8>> {
        let cf = self.cf(table)?;
        self.inner
            .get_cf(&cf, key)?
            .ok_or_else(|| Error::NotFound(format!("{table}/{key}")))
    }

    fn get_all_raw(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let cf = self.cf(table)?;
        Ok(self
            .inner
            .iterator_cf(&cf, IteratorMode::Start)
            .filter_map(|r| r.ok())
            .map(|(k, v)| (String::from_utf8_lossy(&k).into_owned(), v.to_vec()))
            .collect())
    }

    fn delete_raw(&self, table: &str, key: &str) -> Result<()> {
        let cf = self.cf(table)?;
        self.inner.delete_cf(&cf, key).err_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageExt;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
    struct Foo {
        bar: String,
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let dir = tempdir::TempDir::new("db_rocksdb_test").unwrap();
        let db = RocksDbStorage::open(dir.path(), &["foos"]).unwrap();
        db.put("foos", "a", &Foo { bar: "x".into() }).unwrap();
        let got: Foo = db.get("foos", "a").unwrap();
        assert_eq!(got, Foo { bar: "x".into() });
        db.delete("foos", "a").unwrap();
        assert!(db.get::<Foo>("foos", "a").is_err());
    }
}
