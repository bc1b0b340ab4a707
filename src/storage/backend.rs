//! Key-value storage backends.
//!
//! - `InMemoryStore`: ephemeral, for tests and dry runs
//! - `FileStore`: a single JSON file with hex-encoded keys and values, written
//!   atomically on flush

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

/// Trait for storage backends
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Set a value for a key
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key; true if it existed
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All keys starting with `prefix`, sorted
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>>;

    /// Make pending writes durable
    fn flush(&self) -> Result<()>;
}

impl<T: StorageBackend + ?Sized> StorageBackend for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        (**self).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        (**self).delete(key)
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        (**self).exists(key)
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        (**self).list_prefix(prefix)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

fn sorted_with_prefix(data: &HashMap<StorageKey, StorageValue>, prefix: &[u8]) -> Vec<StorageKey> {
    let mut keys: Vec<StorageKey> = data
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect();
    keys.sort();
    keys
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<StorageKey, StorageValue>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.data.read().map_err(|_| Error::Lock)?.len())
    }

    /// Check if empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let data = self.data.read().map_err(|_| Error::Lock)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Error::Lock)?;
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut data = self.data.write().map_err(|_| Error::Lock)?;
        Ok(data.remove(key).is_some())
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let data = self.data.read().map_err(|_| Error::Lock)?;
        Ok(sorted_with_prefix(&data, prefix))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct FileCache {
    entries: HashMap<StorageKey, StorageValue>,
    dirty: bool,
}

/// File-based storage backend using JSON
#[derive(Debug)]
pub struct FileStore {
    base_path: PathBuf,
    cache: RwLock<FileCache>,
}

impl FileStore {
    /// Name of the data file inside the store directory
    pub const DATA_FILE: &'static str = "store.json";

    /// Open (or create) a store in directory `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            Error::Storage(format!("cannot create {}: {}", base_path.display(), e))
        })?;

        let entries = Self::read_entries(&base_path.join(Self::DATA_FILE))?;
        tracing::debug!("Opened file store at {} ({} entries)", base_path.display(), entries.len());

        Ok(Self {
            base_path,
            cache: RwLock::new(FileCache {
                entries,
                dirty: false,
            }),
        })
    }

    /// Path of the data file
    pub fn data_file_path(&self) -> PathBuf {
        self.base_path.join(Self::DATA_FILE)
    }

    fn read_entries(path: &Path) -> Result<HashMap<StorageKey, StorageValue>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let file = File::open(path)
            .map_err(|e| Error::Storage(format!("cannot open {}: {}", path.display(), e)))?;
        let encoded: HashMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Storage(format!("cannot parse {}: {}", path.display(), e)))?;

        encoded
            .into_iter()
            .map(|(k, v)| {
                let key = hex::decode(&k).map_err(|e| Error::Storage(format!("bad key {}: {}", k, e)))?;
                let value = hex::decode(&v).map_err(|e| Error::Storage(format!("bad value at {}: {}", k, e)))?;
                Ok((key, value))
            })
            .collect()
    }

    fn write_entries(&self, entries: &HashMap<StorageKey, StorageValue>) -> Result<()> {
        let encoded: std::collections::BTreeMap<String, String> = entries
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();

        let path = self.data_file_path();
        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)
                .map_err(|e| Error::Storage(format!("cannot create {}: {}", tmp.display(), e)))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &encoded)
                .map_err(|e| Error::Storage(format!("cannot write {}: {}", tmp.display(), e)))?;
            writer
                .flush()
                .map_err(|e| Error::Storage(format!("cannot write {}: {}", tmp.display(), e)))?;
        }
        fs::rename(&tmp, &path)
            .map_err(|e| Error::Storage(format!("cannot replace {}: {}", path.display(), e)))
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let cache = self.cache.read().map_err(|_| Error::Lock)?;
        Ok(cache.entries.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut cache = self.cache.write().map_err(|_| Error::Lock)?;
        cache.entries.insert(key.to_vec(), value.to_vec());
        cache.dirty = true;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut cache = self.cache.write().map_err(|_| Error::Lock)?;
        let existed = cache.entries.remove(key).is_some();
        cache.dirty |= existed;
        Ok(existed)
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let cache = self.cache.read().map_err(|_| Error::Lock)?;
        Ok(sorted_with_prefix(&cache.entries, prefix))
    }

    fn flush(&self) -> Result<()> {
        let mut cache = self.cache.write().map_err(|_| Error::Lock)?;
        if cache.dirty {
            self.write_entries(&cache.entries)?;
            cache.dirty = false;
        }
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("File store flush on drop failed: {}", e);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED STORE WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Bincode-encoding wrapper around a storage backend
pub struct TypedStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> TypedStore<B> {
    /// Create a new typed store
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.backend
            .get(key)?
            .map(|data| {
                bincode::deserialize(&data)
                    .map_err(|e| Error::Deserialization(format!("value at {}: {}", hex::encode(key), e)))
            })
            .transpose()
    }

    /// Set a typed value
    pub fn set<T: Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        let data = bincode::serialize(value)
            .map_err(|e| Error::Serialization(format!("value at {}: {}", hex::encode(key), e)))?;
        self.backend.set(key, &data)
    }

    /// Delete a value
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.backend.delete(key)
    }

    /// Check if a key exists
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.backend.exists(key)
    }

    /// List keys with prefix
    pub fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        self.backend.list_prefix(prefix)
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for different data types
pub mod prefixes {
    /// Reward ledger prefix
    pub const LEDGER: &[u8] = b"ldg:";
    /// Engine config prefix
    pub const CONFIG: &[u8] = b"cfg:";
    /// Collateral whitelist prefix
    pub const WHITELIST: &[u8] = b"wl:";
    /// Event history prefix
    pub const EVENTS: &[u8] = b"evt:";
}

/// Create a key with a prefix
pub fn make_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(prefix.len() + key.len());
    result.extend_from_slice(prefix);
    result.extend_from_slice(key);
    result
}
