use crate::error::*;
use crate::storage::Storage;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-process store backing `dev` mode and unit tests. Never persisted across restarts.
#[derive(Debug, Default)]
pub struct MemoryKVStore {
    tables: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKVStore {
    pub fn new() -> Self { Self::default() }
}

impl Storage for MemoryKVStore {
    fn ensure_table(&self, table: &str) -> Result<()> {
        self.tables.write().unwrap().entry(table.to_string()).or_default();
        Ok(())
    }

    fn put_raw(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        self.tables
            .write()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_raw(&self, table: &str, key: &str) -> Result<Vec<u8>> {
        self.tables
            .read()
            .unwrap()
            .get(table)
            .and_then(|t| t.get(key))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{table}/{key}")))
    }

    fn get_all_raw(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .get(table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn delete_raw(&self, table: &str, key: &str) -> Result<()> {
        if let Some(t) = self.tables.write().unwrap().get_mut(table) {
            t.remove(key);
        }
        Ok(())
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
        let db = MemoryKVStore::new();
        db.ensure_table("foos").unwrap();
        db.put("foos", "a", &Foo { bar: "x".into() }).unwrap();
        let got: Foo = db.get("foos", "a").unwrap();
        assert_eq!(got, Foo { bar: "x".into() });
        db.delete("foos", "a").unwrap();
        assert!(db.get::<Foo>("foos", "a").is_err());
    }

    #[test]
    fn reapplying_same_row_is_idempotent() {
        let db = MemoryKVStore::new();
        db.ensure_table("candles").unwrap();
        let row = Foo { bar: "same".into() };
        db.put("candles", "k", &row).unwrap();
        db.put("candles", "k", &row).unwrap();
        let all = db.get_all::<Foo>("candles").unwrap();
        assert_eq!(all.len(), 1);
    }
}
