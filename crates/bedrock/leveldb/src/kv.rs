//! The seam between the chunk codec and the actual storage engine.
//!
//! The codec only needs get/put/has/delete and a prefix scan, so it runs
//! against this trait; production worlds use [`LevelDbStore`] over
//! `rusty-leveldb`, tests use [`MemoryStore`].

use std::collections::BTreeMap;

use rusty_leveldb::{LdbIterator, DB as LevelDb, Status};
use thiserror::Error;


#[derive(Error, Debug)]
#[error("key-value store error: {0}")]
pub struct KvError(pub String);

impl From<Status> for KvError {
    fn from(status: Status) -> Self {
        Self(status.to_string())
    }
}

/// A sorted key-value store. Concurrency guarantees are whatever the
/// backing engine provides; they pass through unchanged.
pub trait KvStore {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), KvError>;

    fn has(&mut self, key: &[u8]) -> Result<bool, KvError> {
        Ok(self.get(key)?.is_some())
    }

    /// All `(key, value)` pairs whose key starts with `prefix`, in key
    /// order.
    fn scan_prefix(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError>;

    /// Flushes buffered writes to durable storage, where the engine
    /// buffers at all.
    fn flush(&mut self) -> Result<(), KvError> {
        Ok(())
    }
}

/// A world database backed by `rusty-leveldb`.
pub struct LevelDbStore {
    db: LevelDb,
}

impl LevelDbStore {
    #[inline]
    pub fn new(db: LevelDb) -> Self {
        Self { db }
    }
}

impl std::fmt::Debug for LevelDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LevelDbStore")
    }
}

impl KvStore for LevelDbStore {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.db.get(key))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.db.put(key, value).map_err(KvError::from)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KvError> {
        self.db.delete(key).map_err(KvError::from)
    }

    fn scan_prefix(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError> {
        let mut iter = self.db.new_iter().map_err(KvError::from)?;

        let mut pairs = Vec::new();
        while let Some((key, value)) = iter.next() {
            if key.starts_with(prefix) {
                pairs.push((key, value));
            }
        }
        Ok(pairs)
    }

    fn flush(&mut self) -> Result<(), KvError> {
        self.db.flush().map_err(KvError::from)
    }
}

/// An in-memory store for tests and scratch work.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KvError> {
        self.entries.remove(key);
        Ok(())
    }

    fn scan_prefix(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError> {
        Ok(self
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
