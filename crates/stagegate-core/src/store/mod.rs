//! Shared document tree access.
//!
//! Every backend exposes the same two operations over a JSON tree addressed by
//! `/`-separated paths:
//!
//! - [`DocumentStore::read`] returns the subtree at a path, or `None`.
//! - [`DocumentStore::update`] applies a [`Patch`] whose keys are paths
//!   relative to the target. `null` deletes, missing parents are created, and
//!   all keys land atomically or not at all.
//!
//! Nothing here retries. Callers see [`StoreError::Unavailable`] and decide.

pub mod memory;
mod path;
pub mod sqlite;
pub mod tree;

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::ErrorCode;

pub use memory::MemoryStore;
pub use path::DocPath;
pub use sqlite::SqliteStore;

/// Relative-path → value map applied by [`DocumentStore::update`].
pub type Patch = Map<String, Value>;

/// Errors raised by document store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("document store I/O failed: {0}")]
    Io(String),

    #[error("document at '{path}' is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("invalid document path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) | Self::Io(_) => ErrorCode::StoreUnavailable,
            Self::Corrupt { .. } => ErrorCode::StoreCorrupt,
            Self::InvalidPath { .. } => ErrorCode::InvalidPath,
        }
    }

    /// `true` for failures that may clear up on their own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// A hierarchical JSON document store.
pub trait DocumentStore: Send + Sync {
    /// Read the subtree at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be read.
    fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError>;

    /// Apply `patch` under `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the patch is invalid or cannot be written;
    /// nothing is written in that case.
    fn update(&self, path: &DocPath, patch: &Patch) -> Result<(), StoreError>;

    /// Replace the subtree at `path` with `value` (`null` deletes it).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] for the root path, otherwise see
    /// [`DocumentStore::update`].
    fn set(&self, path: &DocPath, value: Value) -> Result<(), StoreError> {
        let (Some(parent), Some(key)) = (path.parent(), path.last()) else {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
                reason: "cannot replace the tree root",
            });
        };
        let mut patch = Patch::new();
        patch.insert(key.to_string(), value);
        self.update(&parent, &patch)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        (**self).read(path)
    }

    fn update(&self, path: &DocPath, patch: &Patch) -> Result<(), StoreError> {
        (**self).update(path, patch)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        (**self).read(path)
    }

    fn update(&self, path: &DocPath, patch: &Patch) -> Result<(), StoreError> {
        (**self).update(path, patch)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Box<S> {
    fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        (**self).read(path)
    }

    fn update(&self, path: &DocPath, patch: &Patch) -> Result<(), StoreError> {
        (**self).update(path, patch)
    }
}
