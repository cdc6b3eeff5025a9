//! AEAD and keyed-hash primitives used by the record store.
//!
//! Sealing uses AES-256-GCM with a fresh random nonce per call and produces a
//! self-describing JSON token. The keyed hash is HMAC-SHA256; one keyed
//! instance serves both slot naming and value tags.

use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use slotvault_core::SecureStoreError;

use crate::key_provider::MasterKey;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm label written into every token.
pub const CIPHER_ALG: &str = "aes-256-gcm";
/// Token format version.
pub const TOKEN_VERSION: u8 = 1;
/// Output length of the keyed hash in bytes.
pub const MAC_LEN: usize = 32;

const NONCE_LEN: usize = 12;

/// Sealed value as stored in a data slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext(String);

impl Ciphertext {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Ciphertext {
    fn from(token: String) -> Self {
        Self(token)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    alg: String,
    iv: String,
    ct: String,
}

/// AES-256-GCM engine bound to one master key.
#[derive(Clone)]
pub struct Sealer {
    cipher: Aes256Gcm,
}

impl Sealer {
    pub fn new(key: &MasterKey) -> Result<Self, SecureStoreError> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| {
            SecureStoreError::InvalidKey {
                reason: format!("cipher init failed: {e}"),
            }
        })?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<Ciphertext, SecureStoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ct = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(encryption_err)?;

        let envelope = Envelope {
            v: TOKEN_VERSION,
            alg: CIPHER_ALG.to_string(),
            iv: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ct: URL_SAFE_NO_PAD.encode(ct),
        };
        let token = serde_json::to_string(&envelope).map_err(|e| {
            SecureStoreError::Serialization {
                reason: e.to_string(),
            }
        })?;
        Ok(Ciphertext(token))
    }

    pub fn unseal(&self, token: &str) -> Result<Vec<u8>, SecureStoreError> {
        let envelope: Envelope = serde_json::from_str(token)
            .map_err(|e| decryption_err(format!("malformed token: {e}")))?;
        if envelope.v != TOKEN_VERSION {
            return Err(decryption_err(format!(
                "unsupported token version {}",
                envelope.v
            )));
        }
        if envelope.alg != CIPHER_ALG {
            return Err(decryption_err(format!(
                "unsupported algorithm {}",
                envelope.alg
            )));
        }

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(envelope.iv)
            .map_err(|e| decryption_err(format!("nonce decode failed: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(decryption_err(format!(
                "expected {NONCE_LEN}-byte nonce, got {}",
                nonce_bytes.len()
            )));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ct = URL_SAFE_NO_PAD
            .decode(envelope.ct)
            .map_err(|e| decryption_err(format!("ciphertext decode failed: {e}")))?;

        self.cipher
            .decrypt(nonce, ct.as_ref())
            .map_err(|e| decryption_err(format!("decrypt failed: {e}")))
    }
}

/// HMAC-SHA256 keyed with the master key.
#[derive(Clone)]
pub struct MacKey {
    mac: HmacSha256,
}

impl MacKey {
    pub fn new(key: &MasterKey) -> Result<Self, SecureStoreError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes()).map_err(|e| {
            SecureStoreError::InvalidKey {
                reason: format!("mac init failed: {e}"),
            }
        })?;
        Ok(Self { mac })
    }

    pub fn compute(&self, message: &[u8]) -> [u8; MAC_LEN] {
        let mut mac = self.mac.clone();
        mac.update(message);
        let digest = mac.finalize().into_bytes();
        let mut out = [0u8; MAC_LEN];
        out.copy_from_slice(&digest);
        out
    }

    /// Constant-time check of `tag` against the MAC of `message`.
    pub fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.verify_slice(tag).is_ok()
    }
}

fn encryption_err(err: aes_gcm::Error) -> SecureStoreError {
    SecureStoreError::Encryption {
        reason: err.to_string(),
    }
}

fn decryption_err(reason: String) -> SecureStoreError {
    SecureStoreError::Decryption { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_provider::KEY_LEN;

    fn key(byte: u8) -> MasterKey {
        MasterKey::new("test", [byte; KEY_LEN])
    }

    #[test]
    fn seal_then_unseal_returns_plaintext() {
        let sealer = Sealer::new(&key(1)).expect("sealer");
        let token = sealer.seal(b"hello-slotvault").expect("seal");

        assert!(!token.as_str().contains("hello-slotvault"));
        assert!(token.as_str().contains(CIPHER_ALG));
        assert_eq!(sealer.unseal(token.as_str()).expect("unseal"), b"hello-slotvault");
    }

    #[test]
    fn seal_uses_fresh_nonce() {
        let sealer = Sealer::new(&key(1)).expect("sealer");
        let a = sealer.seal(b"same").expect("seal");
        let b = sealer.seal(b"same").expect("seal");
        assert_ne!(a, b);
    }

    #[test]
    fn unseal_with_other_key_fails() {
        let token = Sealer::new(&key(1)).unwrap().seal(b"secret").unwrap();
        let err = Sealer::new(&key(2))
            .unwrap()
            .unseal(token.as_str())
            .expect_err("wrong key must fail");
        assert!(matches!(err, SecureStoreError::Decryption { .. }));
    }

    #[test]
    fn unseal_rejects_garbage_and_short_nonce() {
        let sealer = Sealer::new(&key(1)).unwrap();
        assert!(matches!(
            sealer.unseal("not json"),
            Err(SecureStoreError::Decryption { .. })
        ));

        let short = r#"{"v":1,"alg":"aes-256-gcm","iv":"AAAA","ct":"AAAA"}"#;
        assert!(matches!(
            sealer.unseal(short),
            Err(SecureStoreError::Decryption { .. })
        ));
    }

    #[test]
    fn unseal_rejects_unknown_algorithm() {
        let sealer = Sealer::new(&key(1)).unwrap();
        let token = sealer.seal(b"x").unwrap().into_string();
        let swapped = token.replace(CIPHER_ALG, "rot13");
        let err = sealer.unseal(&swapped).expect_err("unknown alg");
        assert_eq!(
            err,
            SecureStoreError::Decryption {
                reason: "unsupported algorithm rot13".into()
            }
        );
    }

    #[test]
    fn mac_is_deterministic_and_keyed() {
        let a = MacKey::new(&key(1)).unwrap();
        let b = MacKey::new(&key(2)).unwrap();

        assert_eq!(a.compute(b"user.token"), a.compute(b"user.token"));
        assert_ne!(a.compute(b"user.token"), b.compute(b"user.token"));
    }

    #[test]
    fn verify_accepts_only_matching_tag() {
        let mac = MacKey::new(&key(1)).unwrap();
        let tag = mac.compute(b"value");

        assert!(mac.verify(b"value", &tag));
        assert!(!mac.verify(b"other", &tag));
        assert!(!mac.verify(b"value", &tag[..16]));
    }

    #[test]
    fn seal_failure_maps_to_encryption_error() {
        let err = encryption_err(aes_gcm::Error);
        assert!(matches!(err, SecureStoreError::Encryption { .. }));
        assert!(!err.is_corruption());
    }
}
