use crate::{DBColumn, Error, KeyValueStore, KeyValueStoreOp, get_key_for_col};
use parking_lot::RwLock;
use std::collections::BTreeMap;

type DBMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// A key-value store backed by an ordered in-memory map, used for testing
/// and ephemeral nodes.
#[derive(Default)]
pub struct MemoryStore {
    db: RwLock<DBMap>,
}

impl MemoryStore {
    /// Create a new, empty database.
    pub fn open() -> Self {
        Self {
            db: RwLock::new(BTreeMap::new()),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_bytes(&self, column: DBColumn, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let column_key = get_key_for_col(column, key);
        Ok(self.db.read().get(&column_key).cloned())
    }

    fn put_bytes(&self, column: DBColumn, key: &[u8], value: &[u8]) -> Result<(), Error> {
        let column_key = get_key_for_col(column, key);
        self.db.write().insert(column_key, value.to_vec());
        Ok(())
    }

    fn key_exists(&self, column: DBColumn, key: &[u8]) -> Result<bool, Error> {
        let column_key = get_key_for_col(column, key);
        Ok(self.db.read().contains_key(&column_key))
    }

    fn key_delete(&self, column: DBColumn, key: &[u8]) -> Result<(), Error> {
        let column_key = get_key_for_col(column, key);
        self.db.write().remove(&column_key);
        Ok(())
    }

    fn do_atomically(&self, batch: Vec<KeyValueStoreOp>) -> Result<(), Error> {
        let mut db = self.db.write();
        for op in batch {
            match op {
                KeyValueStoreOp::PutKeyValue(key, value) => {
                    db.insert(key, value);
                }
                KeyValueStoreOp::DeleteKey(key) => {
                    db.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn iter_range(
        &self,
        column: DBColumn,
        gte: &[u8],
        lt: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        let start = get_key_for_col(column, gte);
        let end = get_key_for_col(column, lt);
        Ok(self
            .db
            .read()
            .range(start..end)
            .map(|(key, value)| (key[1..].to_vec(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::open();
        store
            .put_bytes(DBColumn::BeaconBlock, b"key", b"value")
            .unwrap();
        assert_eq!(
            store.get_bytes(DBColumn::BeaconBlock, b"key").unwrap(),
            Some(b"value".to_vec())
        );
        assert!(store.key_exists(DBColumn::BeaconBlock, b"key").unwrap());

        // The same key in another column is distinct.
        assert_eq!(store.get_bytes(DBColumn::BlobSidecar, b"key").unwrap(), None);

        store.key_delete(DBColumn::BeaconBlock, b"key").unwrap();
        assert_eq!(store.get_bytes(DBColumn::BeaconBlock, b"key").unwrap(), None);
    }

    #[test]
    fn range_iteration_is_ordered_and_bounded() {
        let store = MemoryStore::open();
        for i in [3_u8, 1, 2, 9] {
            store
                .put_bytes(DBColumn::ArchiveBlock, &[i], &[i])
                .unwrap();
        }

        let range = store
            .iter_range(DBColumn::ArchiveBlock, &[1], &[9])
            .unwrap();
        let keys: Vec<_> = range.iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn atomic_batch_applies_all_ops() {
        let store = MemoryStore::open();
        store
            .put_bytes(DBColumn::BeaconBlock, b"stale", b"x")
            .unwrap();

        store
            .do_atomically(vec![
                KeyValueStoreOp::PutKeyValue(
                    get_key_for_col(DBColumn::BeaconBlock, b"fresh"),
                    b"y".to_vec(),
                ),
                KeyValueStoreOp::DeleteKey(get_key_for_col(DBColumn::BeaconBlock, b"stale")),
            ])
            .unwrap();

        assert!(store.key_exists(DBColumn::BeaconBlock, b"fresh").unwrap());
        assert!(!store.key_exists(DBColumn::BeaconBlock, b"stale").unwrap());
    }
}
