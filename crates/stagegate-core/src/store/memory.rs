//! In-process document store.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{DocPath, DocumentStore, Patch, StoreError, tree};

/// A whole document tree held behind one lock.
///
/// Can be taken offline to simulate an unreachable backend; every call then
/// fails with [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    root: RwLock<Value>,
    offline: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree.
    #[must_use]
    pub fn with_root(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of updates applied so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of the whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if a writer panicked mid-update.
    pub fn snapshot(&self) -> Result<Value, StoreError> {
        Ok(self.read_guard()?.clone())
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, Value>, StoreError> {
        self.root.read().map_err(|_| poisoned())
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, Value>, StoreError> {
        self.root.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Corrupt {
        path: String::new(),
        reason: "memory store lock poisoned".into(),
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        self.ensure_online()?;
        let root = self.read_guard()?;
        Ok(tree::get_value(&root, path.segments()).cloned())
    }

    fn update(&self, path: &DocPath, patch: &Patch) -> Result<(), StoreError> {
        self.ensure_online()?;
        let writes = tree::resolve_patch(path, patch)?;
        let mut root = self.write_guard()?;
        for (target, value) in writes {
            tree::set_value(&mut root, target.segments(), value);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
