//! crates/relevamiento_core/src/store/persist.rs
//!
//! Mirrors the state tree into durable storage after dispatches that touch a
//! watched slice, so an in-progress survey survives a reload.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use super::slices::SchoolSpace;
use super::{Action, DispatchHook, Slice, Snapshot};
use crate::ports::{DurableStorage, StorageError};

/// Key the whole tree is stored under.
pub const ROOT_KEY: &str = "persist:root";

pub struct PersistenceBridge {
    storage: Arc<dyn DurableStorage>,
    key: String,
    watched: BTreeSet<&'static str>,
}

impl PersistenceBridge {
    /// A bridge that mirrors the tree whenever the session identity changes.
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self {
            storage,
            key: ROOT_KEY.to_string(),
            watched: BTreeSet::from([SchoolSpace::NAME]),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Also mirror after dispatches to `S`.
    pub fn watch<S: Slice>(mut self) -> Self {
        self.watched.insert(S::NAME);
        self
    }

    /// The last mirrored tree, if one exists and parses.
    pub fn restore(&self) -> Option<serde_json::Value> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %self.key, error = %err, "Failed to read persisted state");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(tree) => Some(tree),
            Err(err) => {
                warn!(key = %self.key, error = %err, "Discarding unparsable persisted state");
                None
            }
        }
    }

    /// Forgets the mirrored tree.
    pub fn purge(&self) {
        if let Err(err) = self.storage.remove(&self.key) {
            warn!(key = %self.key, error = %err, "Failed to purge persisted state");
        }
    }

    fn mirror(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let tree = snapshot
            .to_json()
            .map_err(|e| StorageError::Rejected(e.to_string()))?;
        let encoded =
            serde_json::to_string(&tree).map_err(|e| StorageError::Rejected(e.to_string()))?;
        self.storage.set(&self.key, &encoded)
    }
}

impl DispatchHook for PersistenceBridge {
    fn after_dispatch(&self, _previous: &Snapshot, action: &Action, next: &Snapshot) {
        if !self.watched.contains(action.slice()) {
            return;
        }
        match self.mirror(next) {
            Ok(()) => debug!(key = %self.key, slice = action.slice(), "state mirrored"),
            Err(err) => warn!(key = %self.key, error = %err, "Failed to mirror state"),
        }
    }
}

//=========================================================================================
// Storage implementations
//=========================================================================================

/// Accepts every write and never returns anything. Used where no durable
/// storage exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

impl DurableStorage for NoopStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Process-lifetime storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}
