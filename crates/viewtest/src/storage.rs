//! File storage fakes.
//!
//! Views that write uploads go through the thread's default [`Storage`].
//! Tests install an [`InMemoryStorage`] so nothing touches the disk:
//!
//! ```
//! use viewtest::storage::{self, Storage};
//!
//! let guard = storage::install_in_memory();
//! guard.save("/avatars/alice.png", "png-bytes".into()).unwrap();
//!
//! let (dirs, files) = storage::default_storage().unwrap().listdir("/avatars/").unwrap();
//! assert!(dirs.is_empty());
//! assert_eq!(files, vec!["alice.png".to_string()]);
//! ```

use bytes::Bytes;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::StorageError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A file storage backend.
pub trait Storage: Send + Sync {
    /// Reads a stored file.
    fn open(&self, name: &str) -> StorageResult<Bytes>;

    /// Stores `content` under `name`, overwriting, and returns the stored name.
    fn save(&self, name: &str, content: Bytes) -> StorageResult<String>;

    /// Returns true if a file is stored under `name`.
    fn exists(&self, name: &str) -> bool;

    /// Removes a stored file. Deleting a missing file is not an error.
    fn delete(&self, name: &str) -> StorageResult<()>;

    /// Lists the directories and files directly under `path`.
    fn listdir(&self, path: &str) -> StorageResult<(Vec<String>, Vec<String>)>;

    /// Returns the size of a stored file in bytes.
    fn size(&self, name: &str) -> StorageResult<u64>;

    /// Removes every stored file.
    fn clear(&self) {}
}

/// A storage backend that keeps files in memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    files: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

fn check_name(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.ends_with('/') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Storage for InMemoryStorage {
    fn open(&self, name: &str) -> StorageResult<Bytes> {
        self.files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn save(&self, name: &str, content: Bytes) -> StorageResult<String> {
        check_name(name)?;
        tracing::trace!(name, size = content.len(), "Saving in-memory file");
        self.files.write().insert(name.to_string(), content);
        Ok(name.to_string())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        self.files.write().remove(name);
        Ok(())
    }

    fn listdir(&self, path: &str) -> StorageResult<(Vec<String>, Vec<String>)> {
        let prefix = if path.is_empty() || path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for name in self.files.read().keys() {
            let Some(rest) = name.strip_prefix(prefix.as_str()) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    if !dirs.iter().any(|d| d == dir) {
                        dirs.push(dir.to_string());
                    }
                }
                None => files.push(rest.to_string()),
            }
        }
        Ok((dirs, files))
    }

    fn size(&self, name: &str) -> StorageResult<u64> {
        self.open(name).map(|content| content.len() as u64)
    }

    fn clear(&self) {
        self.files.write().clear();
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<Arc<dyn Storage>>> = const { RefCell::new(None) };
}

/// Returns the storage installed on this thread.
///
/// # Errors
///
/// Returns [`StorageError::NotInstalled`] outside an [`install`] scope.
pub fn default_storage() -> StorageResult<Arc<dyn Storage>> {
    ACTIVE.with(|active| active.borrow().clone().ok_or(StorageError::NotInstalled))
}

/// Makes `storage` this thread's default until the guard is dropped.
///
/// On drop the storage is cleared and the previous default comes back.
pub fn install(storage: Arc<dyn Storage>) -> StorageGuard {
    let previous = ACTIVE.with(|active| active.borrow_mut().replace(Arc::clone(&storage)));
    StorageGuard {
        storage,
        previous,
        _not_send: PhantomData,
    }
}

/// Installs a fresh [`InMemoryStorage`].
pub fn install_in_memory() -> StorageGuard {
    install(Arc::new(InMemoryStorage::new()))
}

/// Keeps a storage installed; see [`install`].
#[must_use = "the storage is uninstalled as soon as the guard is dropped"]
pub struct StorageGuard {
    storage: Arc<dyn Storage>,
    previous: Option<Arc<dyn Storage>>,
    _not_send: PhantomData<*const ()>,
}

impl StorageGuard {
    /// Returns the installed storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl std::ops::Deref for StorageGuard {
    type Target = dyn Storage;

    fn deref(&self) -> &Self::Target {
        self.storage.as_ref()
    }
}

impl std::fmt::Debug for StorageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGuard")
            .field("has_previous", &self.previous.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for StorageGuard {
    fn drop(&mut self) {
        self.storage.clear();
        let previous = self.previous.take();
        let _ = ACTIVE.try_with(|active| *active.borrow_mut() = previous);
    }
}
