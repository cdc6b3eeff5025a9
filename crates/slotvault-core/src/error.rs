use std::fmt;

use thiserror::Error;

/// Which half of a physical record a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPart {
    /// Slot holding the sealed value.
    Data,
    /// Slot holding the MAC of the plaintext value.
    Auth,
}

impl fmt::Display for RecordPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordPart::Data => f.write_str("data"),
            RecordPart::Auth => f.write_str("auth"),
        }
    }
}

/// Errors produced by record stores and key-value backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecureStoreError {
    /// Master key material is malformed (wrong length or encoding).
    #[error("invalid master key: {reason}")]
    InvalidKey { reason: String },
    /// Logical key has no physical record, or only half of one.
    #[error("entry not found for key: {key} (missing {part} slot)")]
    NotFound { key: String, part: RecordPart },
    /// The value could not be sealed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },
    /// The sealed value could not be opened.
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },
    /// The decrypted value does not match its stored MAC.
    #[error("HMAC mismatch: data corrupted")]
    Integrity,
    /// Logical key collides with the auth-slot naming scheme.
    #[error("logical key is reserved: {key}")]
    InvalidLogicalKey { key: String },
    /// Value could not be serialized or deserialized.
    #[error("serialization failure: {reason}")]
    Serialization { reason: String },
    /// Store configuration is unusable.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl SecureStoreError {
    /// True for failures that indicate tampering or corruption of stored data.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SecureStoreError::Decryption { .. } | SecureStoreError::Integrity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_message_names_corruption() {
        let msg = SecureStoreError::Integrity.to_string();
        assert!(msg.contains("HMAC mismatch"));
        assert!(msg.contains("corrupted"));
    }

    #[test]
    fn not_found_reports_missing_part() {
        let err = SecureStoreError::NotFound {
            key: "user.token".into(),
            part: RecordPart::Auth,
        };
        assert_eq!(
            err.to_string(),
            "entry not found for key: user.token (missing auth slot)"
        );
        assert!(!err.is_corruption());
    }

    #[test]
    fn encryption_failure_is_not_corruption() {
        let err = SecureStoreError::Encryption {
            reason: "aead::Error".into(),
        };
        assert_eq!(err.to_string(), "encryption failed: aead::Error");
        assert!(!err.is_corruption());
    }
}
