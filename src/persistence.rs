//! Ordered key-value storage for module records
//!
//! The host owns the store and hands it to the module for the duration of a
//! hook call. Three backends are provided:
//! - [`MemoryStore`] for tests and ephemeral runs,
//! - [`SqliteStore`] for the node binary (one table of BLOB keys, which
//!   SQLite orders bytewise),
//! - [`StoreBatch`], a write buffer over any other store whose writes reach
//!   the parent only on [`StoreBatch::commit`].

use crate::error::ChainError;
use crate::keys::prefix_end;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Bound;

pub type KvPair = (Vec<u8>, Vec<u8>);

/// A buffered write: `Some(value)` sets the key, `None` deletes it.
pub type WriteOp = (Vec<u8>, Option<Vec<u8>>);

/// Read side of the store.
pub trait KvRead {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError>;

    /// All pairs with `start <= key < end`, ascending by key. `end = None`
    /// means unbounded above.
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>, ChainError>;

    /// Greatest pair in `[start, end)`.
    fn last_in_range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Option<KvPair>, ChainError> {
        Ok(self.range(start, end)?.pop())
    }

    fn has(&self, key: &[u8]) -> Result<bool, ChainError> {
        Ok(self.get(key)?.is_some())
    }

    fn prefix_iter(&self, prefix: &[u8]) -> Result<Vec<KvPair>, ChainError> {
        let end = prefix_end(prefix);
        self.range(prefix, end.as_deref())
    }
}

/// Write side of the store.
pub trait KvStore: KvRead {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), ChainError>;
    fn delete(&mut self, key: &[u8]) -> Result<(), ChainError>;

    /// Applies `ops` in order. Backends that support transactions apply them atomically.
    fn write_batch(&mut self, ops: Vec<WriteOp>) -> Result<(), ChainError> {
        for (key, value) in ops {
            match value {
                Some(value) => self.set(&key, &value)?,
                None => self.delete(&key)?,
            }
        }
        Ok(())
    }
}

impl<T: KvRead + ?Sized> KvRead for &T {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        (**self).get(key)
    }
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>, ChainError> {
        (**self).range(start, end)
    }
    fn last_in_range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Option<KvPair>, ChainError> {
        (**self).last_in_range(start, end)
    }
}

impl<T: KvRead + ?Sized> KvRead for &mut T {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        (**self).get(key)
    }
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>, ChainError> {
        (**self).range(start, end)
    }
    fn last_in_range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Option<KvPair>, ChainError> {
        (**self).last_in_range(start, end)
    }
}

impl<T: KvStore + ?Sized> KvStore for &mut T {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        (**self).set(key, value)
    }
    fn delete(&mut self, key: &[u8]) -> Result<(), ChainError> {
        (**self).delete(key)
    }
    fn write_batch(&mut self, ops: Vec<WriteOp>) -> Result<(), ChainError> {
        (**self).write_batch(ops)
    }
}

impl<T: KvRead + ?Sized> KvRead for Box<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        (**self).get(key)
    }
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>, ChainError> {
        (**self).range(start, end)
    }
    fn last_in_range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Option<KvPair>, ChainError> {
        (**self).last_in_range(start, end)
    }
}

impl<T: KvStore + ?Sized> KvStore for Box<T> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        (**self).set(key, value)
    }
    fn delete(&mut self, key: &[u8]) -> Result<(), ChainError> {
        (**self).delete(key)
    }
    fn write_batch(&mut self, ops: Vec<WriteOp>) -> Result<(), ChainError> {
        (**self).write_batch(ops)
    }
}

/// Encodes a record for storage.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ChainError> {
    Ok(bincode::serialize(value)?)
}

/// Decodes a stored record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ChainError> {
    Ok(bincode::deserialize(bytes)?)
}

fn bounds<'a>(start: &'a [u8], end: Option<&'a [u8]>) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
    (
        Bound::Included(start),
        end.map_or(Bound::Unbounded, Bound::Excluded),
    )
}

fn is_empty_range(start: &[u8], end: Option<&[u8]>) -> bool {
    end.is_some_and(|end| end <= start)
}

/// In-memory ordered store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvRead for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.entries.get(key).cloned())
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>, ChainError> {
        if is_empty_range(start, end) {
            return Ok(Vec::new());
        }
        Ok(self
            .entries
            .range::<[u8], _>(bounds(start, end))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn last_in_range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Option<KvPair>, ChainError> {
        if is_empty_range(start, end) {
            return Ok(None);
        }
        Ok(self
            .entries
            .range::<[u8], _>(bounds(start, end))
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl KvStore for MemoryStore {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), ChainError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed store. Each instance owns one table of `(key BLOB, value BLOB)`.
pub struct SqliteStore {
    conn: Connection,
    table: String,
}

impl SqliteStore {
    pub fn open(path: &str, table: &str) -> Result<Self, ChainError> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ChainError::DatabaseError(format!("Invalid table name '{}'", table)));
        }
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    key BLOB PRIMARY KEY,
                    value BLOB NOT NULL
                )",
                table
            ),
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create {} table: {}", table, e)))?;

        Ok(SqliteStore {
            conn,
            table: table.to_string(),
        })
    }

    fn select_range(&self, start: &[u8], end: Option<&[u8]>, order: &str, limit: Option<u32>) -> Result<Vec<KvPair>, ChainError> {
        let limit = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
        let rows = match end {
            Some(end) => {
                let sql = format!(
                    "SELECT key, value FROM {} WHERE key >= ?1 AND key < ?2 ORDER BY key {}{}",
                    self.table, order, limit
                );
                let mut stmt = self
                    .conn
                    .prepare(&sql)
                    .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
                let rows = stmt
                    .query_map(params![start, end], |row| Ok((row.get(0)?, row.get(1)?)))
                    .map_err(|e| ChainError::DatabaseError(format!("Failed to query range: {}", e)))?;
                let collected = rows.collect::<Result<Vec<KvPair>, _>>();
                collected
            }
            None => {
                let sql = format!(
                    "SELECT key, value FROM {} WHERE key >= ?1 ORDER BY key {}{}",
                    self.table, order, limit
                );
                let mut stmt = self
                    .conn
                    .prepare(&sql)
                    .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
                let rows = stmt
                    .query_map(params![start], |row| Ok((row.get(0)?, row.get(1)?)))
                    .map_err(|e| ChainError::DatabaseError(format!("Failed to query range: {}", e)))?;
                let collected = rows.collect::<Result<Vec<KvPair>, _>>();
                collected
            }
        };
        rows.map_err(|e| ChainError::DatabaseError(format!("Failed to read row: {}", e)))
    }
}

impl KvRead for SqliteStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        self.conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.table),
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to read key: {}", e)))
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>, ChainError> {
        if is_empty_range(start, end) {
            return Ok(Vec::new());
        }
        self.select_range(start, end, "ASC", None)
    }

    fn last_in_range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Option<KvPair>, ChainError> {
        if is_empty_range(start, end) {
            return Ok(None);
        }
        Ok(self.select_range(start, end, "DESC", Some(1))?.pop())
    }
}

impl KvStore for SqliteStore {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        self.conn
            .execute(
                &format!("INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)", self.table),
                params![key, value],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to write key: {}", e)))?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), ChainError> {
        self.conn
            .execute(&format!("DELETE FROM {} WHERE key = ?1", self.table), params![key])
            .map_err(|e| ChainError::DatabaseError(format!("Failed to delete key: {}", e)))?;
        Ok(())
    }

    /// Applies every write inside one SQLite transaction.
    fn write_batch(&mut self, ops: Vec<WriteOp>) -> Result<(), ChainError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to start transaction: {}", e)))?;
        for (key, value) in &ops {
            let written = match value {
                Some(value) => tx.execute(
                    &format!("INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)", self.table),
                    params![key, value],
                ),
                None => tx.execute(&format!("DELETE FROM {} WHERE key = ?1", self.table), params![key]),
            };
            written.map_err(|e| ChainError::DatabaseError(format!("Failed to write batch: {}", e)))?;
        }
        tx.commit()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }
}

/// Write buffer layered over another store.
///
/// Reads see buffered writes first. Dropping the batch discards every write;
/// [`StoreBatch::commit`] hands them to the parent in one `write_batch` call.
/// Batches nest: a batch over a batch commits into its parent's buffer.
pub struct StoreBatch<'a> {
    parent: &'a mut dyn KvStore,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> StoreBatch<'a> {
    pub fn new(parent: &'a mut dyn KvStore) -> Self {
        StoreBatch {
            parent,
            pending: BTreeMap::new(),
        }
    }

    /// Reopens a batch from writes previously taken with [`StoreBatch::into_pending`].
    pub fn resume(parent: &'a mut dyn KvStore, pending: Vec<WriteOp>) -> Self {
        StoreBatch {
            parent,
            pending: pending.into_iter().collect(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Detaches the buffered writes without applying them.
    pub fn into_pending(self) -> Vec<WriteOp> {
        self.pending.into_iter().collect()
    }

    /// Applies the buffered writes to the parent and returns how many there were.
    pub fn commit(self) -> Result<usize, ChainError> {
        let count = self.pending.len();
        if count > 0 {
            self.parent.write_batch(self.pending.into_iter().collect())?;
        }
        Ok(count)
    }
}

impl KvRead for StoreBatch<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        match self.pending.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.parent.get(key),
        }
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>, ChainError> {
        if is_empty_range(start, end) {
            return Ok(Vec::new());
        }
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.parent.range(start, end)?.into_iter().collect();
        for (key, value) in self.pending.range::<[u8], _>(bounds(start, end)) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

impl KvStore for StoreBatch<'_> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), ChainError> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn write_batch(&mut self, ops: Vec<WriteOp>) -> Result<(), ChainError> {
        self.pending.extend(ops);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(&[0x02, b'a'], b"alice").unwrap();
        store.set(&[0x02, b'b'], b"bob").unwrap();
        store.set(&[0x03, b'x'], b"tx").unwrap();
        store
    }

    #[test]
    fn test_prefix_iter_stays_in_range() {
        let store = seeded();
        let users = store.prefix_iter(&[0x02]).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].1, b"alice".to_vec());
        assert_eq!(store.last_in_range(&[0x02], Some(&[0x03])).unwrap().unwrap().1, b"bob".to_vec());
        assert!(store.range(&[0x03], Some(&[0x02])).unwrap().is_empty());
    }

    #[test]
    fn test_batch_reads_through_and_discards_on_drop() {
        let mut store = seeded();
        {
            let mut batch = StoreBatch::new(&mut store);
            batch.set(&[0x02, b'c'], b"carol").unwrap();
            batch.delete(&[0x02, b'a']).unwrap();
            assert_eq!(batch.get(&[0x02, b'c']).unwrap(), Some(b"carol".to_vec()));
            assert_eq!(batch.get(&[0x02, b'a']).unwrap(), None);
            let users = batch.prefix_iter(&[0x02]).unwrap();
            assert_eq!(users.len(), 2);
            assert_eq!(users[0].0, vec![0x02, b'b']);
        }
        assert_eq!(store.get(&[0x02, b'a']).unwrap(), Some(b"alice".to_vec()));
        assert_eq!(store.get(&[0x02, b'c']).unwrap(), None);
    }

    #[test]
    fn test_nested_batches_commit_upwards() {
        let mut store = seeded();
        let pending = {
            let mut outer = StoreBatch::new(&mut store);
            {
                let mut inner = StoreBatch::new(&mut outer);
                inner.set(&[0x04, b'm'], b"miner").unwrap();
                assert_eq!(inner.commit().unwrap(), 1);
            }
            assert_eq!(outer.get(&[0x04, b'm']).unwrap(), Some(b"miner".to_vec()));
            outer.into_pending()
        };
        assert_eq!(store.get(&[0x04, b'm']).unwrap(), None);

        let resumed = StoreBatch::resume(&mut store, pending);
        assert_eq!(resumed.pending_len(), 1);
        resumed.commit().unwrap();
        assert_eq!(store.get(&[0x04, b'm']).unwrap(), Some(b"miner".to_vec()));
    }

    #[test]
    fn test_sqlite_store_orders_blob_keys() {
        let mut store = SqliteStore::open(":memory:", "mychain").unwrap();
        store.set(&[0x05, 0, 0, 0, 0, 0, 0, 1, 0], b"256").unwrap();
        store.set(&[0x05, 0, 0, 0, 0, 0, 0, 0, 2], b"2").unwrap();
        store.set(&[0x04, 0xFF], b"miner").unwrap();

        let blocks = store.prefix_iter(&[0x05]).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].1, b"2".to_vec());
        assert_eq!(store.last_in_range(&[0x05], None).unwrap().unwrap().1, b"256".to_vec());

        store
            .write_batch(vec![(vec![0x04, 0xFF], None), (vec![0x01], Some(b"supply".to_vec()))])
            .unwrap();
        assert!(!store.has(&[0x04, 0xFF]).unwrap());
        assert!(store.has(&[0x01]).unwrap());
    }

    #[test]
    fn test_sqlite_rejects_bad_table_name() {
        assert!(SqliteStore::open(":memory:", "kv; DROP TABLE x").is_err());
    }

    #[test]
    fn test_codec_round_trip() {
        let value = (7u64, "seven".to_string());
        let bytes = encode(&value).unwrap();
        let back: (u64, String) = decode(&bytes).unwrap();
        assert_eq!(back, value);
    }
}
