use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dirs::data_dir;
use slotvault_core::{KeyValueBackend, SecureStoreError, SlotId};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Durable backend: one file per slot under `root`.
///
/// Each write goes through a temp file that is persisted over the target, so a
/// single slot is never observed half-written.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Backend rooted at the platform data directory (`<data_dir>/slotvault/slots`).
    pub fn durable() -> Result<Self, SecureStoreError> {
        Ok(Self::durable_in(&platform_data_dir()?))
    }

    /// Durable layout below an explicit base directory (`<base>/slotvault/slots`).
    pub fn durable_in(base: &Path) -> Self {
        let root = durable_root(base);
        debug!(?root, "opening durable slot directory");
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, slot: &SlotId) -> PathBuf {
        self.root.join(sanitize_slot(slot))
    }
}

/// Resolve the default durable slot directory.
pub fn default_root() -> Result<PathBuf, SecureStoreError> {
    Ok(durable_root(&platform_data_dir()?))
}

fn durable_root(base: &Path) -> PathBuf {
    base.join("slotvault").join("slots")
}

fn platform_data_dir() -> Result<PathBuf, SecureStoreError> {
    data_dir().ok_or_else(|| SecureStoreError::Storage {
        reason: "no data dir available".to_string(),
    })
}

impl KeyValueBackend for FileBackend {
    #[instrument(skip_all, fields(slot = %slot))]
    fn get(&self, slot: &SlotId) -> Result<Option<String>, SecureStoreError> {
        match fs::read(self.path_for(slot)) {
            // Invalid UTF-8 is tampering, not I/O; the record layer rejects the lossy text.
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_err(err)),
        }
    }

    #[instrument(skip_all, fields(slot = %slot))]
    fn set(&self, slot: &SlotId, value: &str) -> Result<(), SecureStoreError> {
        write_atomic(&self.path_for(slot), value.as_bytes())
    }

    #[instrument(skip_all, fields(slot = %slot))]
    fn remove(&self, slot: &SlotId) -> Result<(), SecureStoreError> {
        match fs::remove_file(self.path_for(slot)) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SecureStoreError> {
    let parent = path.parent().ok_or_else(|| SecureStoreError::Storage {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    tmp.write_all(contents).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

// Slot ids are standard base64 and may contain '/'.
fn sanitize_slot(slot: &SlotId) -> String {
    URL_SAFE_NO_PAD.encode(slot.as_str())
}

fn storage_err<E: ToString>(err: E) -> SecureStoreError {
    SecureStoreError::Storage {
        reason: err.to_string(),
    }
}
