//! Core contracts for slotvault: the key-value backend seam and the error taxonomy.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod backend;
pub mod error;

pub use backend::{KeyValueBackend, MemoryBackend, SlotId};
pub use error::{RecordPart, SecureStoreError};
