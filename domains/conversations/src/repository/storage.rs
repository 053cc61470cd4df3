//! Client-local key/value persistence port
//!
//! Values are opaque JSON strings addressed by short keys, mirroring
//! browser local storage. `FileStore` keeps one file per key under a data
//! directory; `MemoryStore` backs tests and ephemeral sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use aidline_common::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Serialization(e) => Error::Serialization(e),
            other => Error::Storage(other.to_string()),
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removing an absent key is not an error
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Run a store call on the blocking pool so file I/O never stalls the runtime
pub(crate) async fn run_blocking<T, F>(store: &Arc<dyn KeyValueStore>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn KeyValueStore) -> StorageResult<T> + Send + 'static,
{
    let store = store.clone();
    let result = tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| Error::Internal(format!("Storage task failed: {}", e)))?;
    Ok(result?)
}

fn is_plain_key(key: &str) -> bool {
    !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// File stem for a key. Plain keys are used verbatim; anything else is
/// base64url-encoded behind a `~`, which plain keys never contain.
fn file_stem(key: &str) -> StorageResult<String> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if is_plain_key(key) {
        Ok(key.to_string())
    } else {
        Ok(format!("~{}", URL_SAFE_NO_PAD.encode(key)))
    }
}

/// One `{key}.json` file per key; keys such as `conversations_auth0|42`
/// are mapped to an encoded file name
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        Ok(self.dir.join(format!("{}.json", file_stem(key)?)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        // Write to a sibling temp file then rename so readers never see a torn value
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, value)?;
        std::fs::rename(&temp_path, &path)?;

        tracing::trace!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, String>,
    fail_writes: bool,
}

/// In-process store; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent `set`/`remove` fail with `Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().values.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock().values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        state.values.remove(key);
        Ok(())
    }
}
