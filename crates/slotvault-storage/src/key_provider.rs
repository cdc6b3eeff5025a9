use std::{
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use slotvault_core::SecureStoreError;
use thiserror::Error;
use zeroize::Zeroize;

/// Length of the master key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// 256-bit master key owned by a record store. Zeroed on drop; `Debug` never prints the bytes.
#[derive(Clone)]
pub struct MasterKey {
    /// Identifier for logging/rotation (never log key bytes).
    pub id: String,
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub fn new(id: impl Into<String>, bytes: [u8; KEY_LEN]) -> Self {
        Self {
            id: id.into(),
            bytes,
        }
    }

    /// Accepts exactly 32 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SecureStoreError> {
        let bytes: [u8; KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| SecureStoreError::InvalidKey {
                    reason: format!("expected {KEY_LEN} bytes, got {}", bytes.len()),
                })?;
        Ok(Self::new("default", bytes))
    }

    /// Accepts a 64-character hex string.
    pub fn from_hex(encoded: &str) -> Result<Self, SecureStoreError> {
        let mut bytes = hex::decode(encoded.trim()).map_err(|e| SecureStoreError::InvalidKey {
            reason: format!("hex decode failed: {e}"),
        })?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Accepts standard base64 (with padding) of 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, SecureStoreError> {
        let mut bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| SecureStoreError::InvalidKey {
                reason: format!("base64 decode failed: {e}"),
            })?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Hex if the input looks like 64 hex digits, base64 otherwise.
    pub fn parse(encoded: &str) -> Result<Self, SecureStoreError> {
        let trimmed = encoded.trim();
        if trimmed.len() == KEY_LEN * 2 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            Self::from_hex(trimmed)
        } else {
            Self::from_base64(trimmed)
        }
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self::new("default", bytes)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("id", &self.id)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Provides the master key to callers that build record stores (OS keychain in production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_or_create(&self) -> Result<MasterKey, KeyError>;
}

/// OS keyring-backed provider. Uses the `keyring` crate to store the key.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn get_or_create(&self) -> Result<MasterKey, KeyError> {
        // Keyring operations are synchronous; wrap in async for trait compatibility.
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;

        if let Some(key) = stored_key(entry.get_password())? {
            return Ok(key.with_id(self.account.clone()));
        }

        let material = MasterKey::generate().with_id(self.account.clone());
        entry
            .set_password(&encode_key(&material))
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        Ok(material)
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<MasterKey>>>,
}

impl InMemoryKeyProvider {
    /// Provider that always hands out the given key.
    pub fn with_key(key: MasterKey) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(key))),
        }
    }
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self) -> Result<MasterKey, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let material = MasterKey::generate();
        *guard = Some(material.clone());
        Ok(material)
    }
}

// Only a missing entry may be replaced by a fresh key; any other failure
// (locked keychain, denied access) must not overwrite what is stored.
fn stored_key(lookup: Result<String, keyring::Error>) -> Result<Option<MasterKey>, KeyError> {
    match lookup {
        Ok(secret) => decode_key(&secret).map(Some),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(KeyError::Keyring(err.to_string())),
    }
}

fn encode_key(material: &MasterKey) -> String {
    general_purpose::STANDARD.encode(material.as_bytes())
}

fn decode_key(secret: &str) -> Result<MasterKey, KeyError> {
    MasterKey::from_base64(secret).map_err(|e| KeyError::Decode(e.to_string()))
}
