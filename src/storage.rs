//! Key-value storage backends
//!
//! Settlement records are read-modify-written through `commit`, which applies
//! a batch of version-guarded writes atomically or not at all. Score rows are
//! plain upserts.

use crate::config::StorageConfig;
use crate::errors::{StorageError, StorageResult};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

/// Record wrapper carrying the optimistic concurrency version
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u64,
}

/// What a guarded write does once its version check passes
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Put(Vec<u8>),
    Delete,
    /// Only assert the version; the key is left untouched
    Check,
}

/// One write inside an atomic commit
#[derive(Clone, Debug)]
pub struct GuardedWrite {
    pub key: Vec<u8>,
    /// Version the writer read; `None` means the key must not exist yet
    pub expected_version: Option<u64>,
    pub op: WriteOp,
}

impl GuardedWrite {
    /// Encode `record` one version past `expected_version`
    pub fn put<T: Serialize>(
        key: Vec<u8>,
        expected_version: Option<u64>,
        record: &T,
    ) -> StorageResult<Self> {
        let next = Versioned {
            version: expected_version.map_or(1, |v| v + 1),
            record,
        };
        let value = serde_json::to_vec(&next).map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to encode record for {}: {}",
                String::from_utf8_lossy(&key),
                e
            ))
        })?;
        Ok(Self {
            key,
            expected_version,
            op: WriteOp::Put(value),
        })
    }

    pub fn delete(key: Vec<u8>, expected_version: u64) -> Self {
        Self {
            key,
            expected_version: Some(expected_version),
            op: WriteOp::Delete,
        }
    }

    /// Fail the commit unless `key` is still at `expected_version`
    pub fn check(key: Vec<u8>, expected_version: Option<u64>) -> Self {
        Self {
            key,
            expected_version,
            op: WriteOp::Check,
        }
    }
}

pub fn decode_versioned<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> StorageResult<Versioned<T>> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::CorruptedData(format!(
            "Failed to decode {}: {}",
            String::from_utf8_lossy(key),
            e
        ))
    })
}

fn version_of(key: &[u8], bytes: Option<&[u8]>) -> StorageResult<Option<u64>> {
    match bytes {
        None => Ok(None),
        Some(bytes) => {
            let header: VersionHeader = serde_json::from_slice(bytes).map_err(|e| {
                StorageError::CorruptedData(format!(
                    "Missing version on {}: {}",
                    String::from_utf8_lossy(key),
                    e
                ))
            })?;
            Ok(Some(header.version))
        }
    }
}

fn check_version(write: &GuardedWrite, current: Option<&[u8]>) -> StorageResult<()> {
    let actual = version_of(&write.key, current)?;
    if actual != write.expected_version {
        return Err(StorageError::Conflict {
            key: String::from_utf8_lossy(&write.key).to_string(),
            expected: write.expected_version,
            actual,
        });
    }
    Ok(())
}

/// Storage interface shared by every backend
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Unguarded upsert
    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every write if and only if every expected version matches
    fn commit(&self, writes: &[GuardedWrite]) -> StorageResult<()>;
}

/// RocksDB-backed store
#[derive(Clone)]
pub struct RocksStorage {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::open(path, &StorageConfig::default())
    }

    pub fn new_with_config(config: &StorageConfig) -> StorageResult<Self> {
        if config.clear_on_start {
            let _ = DB::destroy(&Options::default(), &config.data_directory);
        }
        Self::open(&config.data_directory, config)
    }

    fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::DatabaseOpenFailed(e.to_string()))?;
        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }
}

impl KvStore for RocksStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.db.put(key, value).map_err(StorageError::from)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.db.delete(key).map_err(StorageError::from)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    fn commit(&self, writes: &[GuardedWrite]) -> StorageResult<()> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| StorageError::WriteFailed("commit lock poisoned".to_string()))?;

        let mut batch = WriteBatch::default();
        for write in writes {
            let current = self.get(&write.key)?;
            check_version(write, current.as_deref())?;
            match &write.op {
                WriteOp::Put(value) => batch.put(&write.key, value),
                WriteOp::Delete => batch.delete(&write.key),
                WriteOp::Check => {}
            }
        }
        self.db.write(batch).map_err(StorageError::from)
    }
}

/// Ordered in-memory store for tests and ephemeral runs
#[derive(Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StorageError {
    StorageError::ReadFailed("memory store lock poisoned".to_string())
}

impl KvStore for MemoryStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.data
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.data.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read().map_err(|_| poisoned())?;
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, writes: &[GuardedWrite]) -> StorageResult<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        for write in writes {
            check_version(write, data.get(&write.key).map(|v| v.as_slice()))?;
        }
        for write in writes {
            match &write.op {
                WriteOp::Put(value) => {
                    data.insert(write.key.clone(), value.clone());
                }
                WriteOp::Delete => {
                    data.remove(&write.key);
                }
                WriteOp::Check => {}
            }
        }
        Ok(())
    }
}
