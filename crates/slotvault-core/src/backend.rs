use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::error::SecureStoreError;

/// Opaque name of a single backend entry. Backends never see logical keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SlotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Flat string-keyed store consumed by record stores.
///
/// Writes are atomic per slot only; there is no transaction spanning slots.
pub trait KeyValueBackend: Send + Sync {
    /// Read a slot, `None` when absent.
    fn get(&self, slot: &SlotId) -> Result<Option<String>, SecureStoreError>;

    /// Write a slot, overwriting any existing value.
    fn set(&self, slot: &SlotId, value: &str) -> Result<(), SecureStoreError>;

    /// Remove a slot (idempotent).
    fn remove(&self, slot: &SlotId) -> Result<(), SecureStoreError>;
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Arc<B> {
    fn get(&self, slot: &SlotId) -> Result<Option<String>, SecureStoreError> {
        (**self).get(slot)
    }

    fn set(&self, slot: &SlotId, value: &str) -> Result<(), SecureStoreError> {
        (**self).set(slot, value)
    }

    fn remove(&self, slot: &SlotId) -> Result<(), SecureStoreError> {
        (**self).remove(slot)
    }
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Box<B> {
    fn get(&self, slot: &SlotId) -> Result<Option<String>, SecureStoreError> {
        (**self).get(slot)
    }

    fn set(&self, slot: &SlotId, value: &str) -> Result<(), SecureStoreError> {
        (**self).set(slot, value)
    }

    fn remove(&self, slot: &SlotId) -> Result<(), SecureStoreError> {
        (**self).remove(slot)
    }
}

/// Session-scoped backend: entries live as long as the process (or the last clone).
/// Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<HashMap<SlotId, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots currently held.
    pub fn len(&self) -> Result<usize, SecureStoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SecureStoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// Snapshot of all slot ids, sorted.
    pub fn slots(&self) -> Result<Vec<SlotId>, SecureStoreError> {
        let mut slots: Vec<SlotId> = self.lock()?.keys().cloned().collect();
        slots.sort();
        Ok(slots)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SlotId, String>>, SecureStoreError> {
        self.inner.lock().map_err(|err| SecureStoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, slot: &SlotId) -> Result<Option<String>, SecureStoreError> {
        Ok(self.lock()?.get(slot).cloned())
    }

    fn set(&self, slot: &SlotId, value: &str) -> Result<(), SecureStoreError> {
        self.lock()?.insert(slot.clone(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &SlotId) -> Result<(), SecureStoreError> {
        self.lock()?.remove(slot);
        Ok(())
    }
}
