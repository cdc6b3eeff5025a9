//! Two-slot record protocol over a [`KeyValueBackend`].
//!
//! A logical key `k` maps to two physical slots, both named by the keyed hash:
//!
//! ```text
//! data slot = b64(MAC(k))              -> AEAD.seal(value)
//! auth slot = b64(MAC(k ++ separator)) -> b64(MAC(value))
//! ```
//!
//! The auth tag covers the plaintext, so it is checked after decryption, on
//! top of the AEAD's own authentication.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};
use slotvault_core::{KeyValueBackend, RecordPart, SecureStoreError, SlotId};
use tracing::{debug, instrument, warn};

use crate::{
    crypto::{Ciphertext, MacKey, Sealer},
    file_backend::FileBackend,
    key_provider::MasterKey,
};

/// Suffix appended to a logical key to name its auth slot.
pub const DEFAULT_DOMAIN_SEPARATOR: &str = "org.slotvault.storage.protection";

/// Everything needed to build a [`SecureRecordStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig<B> {
    pub master_key: MasterKey,
    pub backend: B,
    pub domain_separator: String,
}

impl<B> StoreConfig<B> {
    pub fn new(master_key: MasterKey, backend: B) -> Self {
        Self {
            master_key,
            backend,
            domain_separator: DEFAULT_DOMAIN_SEPARATOR.to_string(),
        }
    }

    pub fn with_domain_separator(mut self, separator: impl Into<String>) -> Self {
        self.domain_separator = separator.into();
        self
    }
}

/// Physical slot pair for one logical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSlots {
    pub data: SlotId,
    pub auth: SlotId,
}

/// Encrypting, MAC-verifying facade over a flat key-value backend.
pub struct SecureRecordStore<B = FileBackend> {
    backend: B,
    sealer: Sealer,
    mac: MacKey,
    domain_separator: String,
}

impl SecureRecordStore<FileBackend> {
    /// Store over the default durable backend.
    pub fn create_durable(master_key: &[u8]) -> Result<Self, SecureStoreError> {
        let master_key = MasterKey::from_bytes(master_key)?;
        Self::from_config(StoreConfig::new(master_key, FileBackend::durable()?))
    }

    /// Store over the durable slot layout below `base` instead of the platform data dir.
    pub fn create_durable_in(master_key: &[u8], base: &Path) -> Result<Self, SecureStoreError> {
        let master_key = MasterKey::from_bytes(master_key)?;
        Self::from_config(StoreConfig::new(master_key, FileBackend::durable_in(base)))
    }
}

impl<B: KeyValueBackend> SecureRecordStore<B> {
    /// Fails with `InvalidKey` unless `master_key` is exactly 32 bytes.
    pub fn create(master_key: &[u8], backend: B) -> Result<Self, SecureStoreError> {
        let master_key = MasterKey::from_bytes(master_key)?;
        Self::from_config(StoreConfig::new(master_key, backend))
    }

    pub fn from_config(config: StoreConfig<B>) -> Result<Self, SecureStoreError> {
        if config.domain_separator.is_empty() {
            return Err(SecureStoreError::Config {
                reason: "domain separator must not be empty".to_string(),
            });
        }

        let sealer = Sealer::new(&config.master_key)?;
        let mac = MacKey::new(&config.master_key)?;
        debug!(key_id = %config.master_key.id, "record store ready");
        Ok(Self {
            backend: config.backend,
            sealer,
            mac,
            domain_separator: config.domain_separator,
        })
    }

    pub fn domain_separator(&self) -> &str {
        &self.domain_separator
    }

    /// `b64(MAC(name))`. Same master key and name always give the same slot.
    pub fn derive_slot(&self, name: &str) -> SlotId {
        SlotId::new(STANDARD.encode(self.mac.compute(name.as_bytes())))
    }

    pub fn slots_for(&self, key: &str) -> RecordSlots {
        RecordSlots {
            data: self.derive_slot(key),
            auth: self.derive_slot(&format!("{key}{}", self.domain_separator)),
        }
    }

    pub fn encrypt<T: Serialize + ?Sized>(&self, value: &T) -> Result<Ciphertext, SecureStoreError> {
        let plaintext = to_plaintext(value)?;
        self.sealer.seal(&plaintext)
    }

    pub fn decrypt<T: DeserializeOwned>(&self, ciphertext: &Ciphertext) -> Result<T, SecureStoreError> {
        let plaintext = self.sealer.unseal(ciphertext.as_str())?;
        from_plaintext(&plaintext)
    }

    /// Seal `value` into the data slot, then write its tag into the auth slot.
    ///
    /// The two writes are not atomic; an interrupted put is reported by `get`
    /// as `NotFound` or `Integrity`.
    #[instrument(skip_all)]
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), SecureStoreError> {
        self.check_key(key)?;
        let plaintext = to_plaintext(value)?;
        let ciphertext = self.sealer.seal(&plaintext)?;
        let slots = self.slots_for(key);
        let tag = STANDARD.encode(self.mac.compute(&plaintext));

        debug!(data_slot = %slots.data, auth_slot = %slots.auth, "writing record");
        self.backend.set(&slots.data, ciphertext.as_str())?;
        self.backend.set(&slots.auth, &tag)?;
        Ok(())
    }

    /// Read, decrypt and verify the value stored under `key`.
    #[instrument(skip_all)]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, SecureStoreError> {
        self.check_key(key)?;
        let slots = self.slots_for(key);

        let token = self
            .backend
            .get(&slots.data)?
            .ok_or_else(|| not_found(key, RecordPart::Data))?;
        let plaintext = self.sealer.unseal(&token).inspect_err(|err| {
            warn!(data_slot = %slots.data, %err, "sealed value rejected");
        })?;

        let stored_tag = self
            .backend
            .get(&slots.auth)?
            .ok_or_else(|| not_found(key, RecordPart::Auth))?;
        self.verify_tag(&slots, &plaintext, &stored_tag)?;

        from_plaintext(&plaintext)
    }

    /// Remove both slots; the auth slot goes first. Idempotent.
    #[instrument(skip_all)]
    pub fn remove(&self, key: &str) -> Result<(), SecureStoreError> {
        self.check_key(key)?;
        let slots = self.slots_for(key);
        debug!(data_slot = %slots.data, auth_slot = %slots.auth, "removing record");
        self.backend.remove(&slots.auth)?;
        self.backend.remove(&slots.data)?;
        Ok(())
    }

    /// Whether a data slot exists for `key`. Does not decrypt or verify.
    pub fn contains(&self, key: &str) -> Result<bool, SecureStoreError> {
        self.check_key(key)?;
        Ok(self.backend.get(&self.derive_slot(key))?.is_some())
    }

    fn verify_tag(
        &self,
        slots: &RecordSlots,
        plaintext: &[u8],
        stored_tag: &str,
    ) -> Result<(), SecureStoreError> {
        let verified = match STANDARD.decode(stored_tag) {
            Ok(tag) => self.mac.verify(plaintext, &tag),
            Err(_) => false,
        };
        if verified {
            Ok(())
        } else {
            warn!(auth_slot = %slots.auth, "HMAC mismatch");
            Err(SecureStoreError::Integrity)
        }
    }

    // A key ending with the separator would name its data slot after another key's auth slot.
    fn check_key(&self, key: &str) -> Result<(), SecureStoreError> {
        if key.ends_with(&self.domain_separator) {
            return Err(SecureStoreError::InvalidLogicalKey {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

fn to_plaintext<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SecureStoreError> {
    serde_json::to_vec(value).map_err(|e| SecureStoreError::Serialization {
        reason: e.to_string(),
    })
}

fn from_plaintext<T: DeserializeOwned>(plaintext: &[u8]) -> Result<T, SecureStoreError> {
    serde_json::from_slice(plaintext).map_err(|e| SecureStoreError::Serialization {
        reason: e.to_string(),
    })
}

fn not_found(key: &str, part: RecordPart) -> SecureStoreError {
    SecureStoreError::NotFound {
        key: key.to_string(),
        part,
    }
}
