//! Encrypted, MAC-verified record storage over flat key-value backends.
//! Uses AES-256-GCM for values and HMAC-SHA256 for slot names and value tags.

pub mod crypto;
pub mod file_backend;
pub mod key_provider;
pub mod record_store;

pub use crypto::Ciphertext;
pub use file_backend::FileBackend;
pub use key_provider::{KeyProvider, MasterKey};
pub use record_store::{RecordSlots, SecureRecordStore, StoreConfig, DEFAULT_DOMAIN_SEPARATOR};
