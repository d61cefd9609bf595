//! Durable key-value storage for session units.
//!
//! # Responsibilities
//! - Define the ordered key-value contract a session unit persists through
//! - Provide an in-memory backend and a JSON-file backend
//! - Pick the backend for a session from configuration
//!
//! # Design Decisions
//! - Keys are unique; the last `put` for a key wins
//! - `list` returns entries in key order
//! - The file backend keeps one document per session and rewrites it
//!   through a temp file and rename, so a crash never leaves half a document

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::config::schema::{StorageConfig, StorageKind};
use crate::session::id::SessionId;

/// All entries of a store, ordered by key.
pub type Entries = BTreeMap<String, Value>;

/// Errors raised by a [`DurableStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store document {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store write aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Ordered key-value persistence owned by one session unit.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Every entry, in key order.
    async fn list(&self) -> Result<Entries, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace the value under `key`.
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Store kept in process memory; lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn list(&self) -> Result<Entries, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store persisted as a single JSON document on disk.
///
/// The document is read on first access and cached; every `put` rewrites it.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: Arc<Mutex<Option<Entries>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn read_document(path: &Path) -> Result<Entries, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write_document(path: &Path, entries: &Entries) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let bytes = serde_json::to_vec(entries).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&staging, path).await.map_err(io_err)?;
    Ok(())
}

/// Return the cached document, loading it if needed.
async fn loaded<'a>(
    path: &Path,
    cache: &'a mut Option<Entries>,
) -> Result<&'a mut Entries, StoreError> {
    if cache.is_none() {
        let entries = read_document(path).await?;
        tracing::debug!(path = %path.display(), entries = entries.len(), "Store document loaded");
        *cache = Some(entries);
    }
    Ok(cache.get_or_insert_with(Entries::new))
}

#[async_trait]
impl DurableStore for FileStore {
    async fn list(&self) -> Result<Entries, StoreError> {
        let mut cache = self.cache.lock().await;
        Ok(loaded(&self.path, &mut cache).await?.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut cache = self.cache.lock().await;
        Ok(loaded(&self.path, &mut cache).await?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut cache = Arc::clone(&self.cache).lock_owned().await;
        let path = self.path.clone();
        let key = key.to_string();

        // Once the lock is held the write and the cache update finish together,
        // even if the caller is dropped.
        tokio::spawn(async move {
            let entries = loaded(&path, &mut cache).await?;
            let mut next = entries.clone();
            next.insert(key, value);
            write_document(&path, &next).await?;
            *entries = next;
            Ok::<(), StoreError>(())
        })
        .await?
    }
}

/// Which backend new session units get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File { data_dir: PathBuf },
}

impl StorageBackend {
    pub fn from_config(config: &StorageConfig) -> Self {
        match config.backend {
            StorageKind::Memory => Self::Memory,
            StorageKind::File => Self::File {
                data_dir: PathBuf::from(&config.data_dir),
            },
        }
    }

    /// Open the store for one session.
    pub fn open(&self, id: &SessionId) -> Arc<dyn DurableStore> {
        match self {
            Self::Memory => Arc::new(MemoryStore::new()),
            Self::File { data_dir } => Arc::new(FileStore::new(data_dir.join(format!("{id}.json")))),
        }
    }
}
