//! crates/relevamiento_client/src/storage.rs
//!
//! File-backed durable storage: one JSON document per key inside a directory.

use relevamiento_core::ports::{DurableStorage, StorageError};
use relevamiento_core::NoopStorage;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens `dir`, creating it when missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys such as `persist:root` become safe file names (`persist_root.json`).
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a sibling temporary file, then renames it over the target.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// File storage under `path`, or no-op storage when there is no path or the
/// directory cannot be used.
pub fn storage_for(path: Option<&Path>) -> Arc<dyn DurableStorage> {
    match path {
        Some(dir) => match FileStorage::new(dir) {
            Ok(storage) => Arc::new(storage),
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "Durable storage unavailable, state will not persist");
                Arc::new(NoopStorage)
            }
        },
        None => Arc::new(NoopStorage),
    }
}
