use std::path::PathBuf;

use crate::config::Config;
use color_eyre::{eyre::eyre, Result};
use slotvault_core::{KeyValueBackend, MemoryBackend};
use slotvault_storage::{
    file_backend::{default_root, FileBackend},
    key_provider::{InMemoryKeyProvider, KeyProvider, KeyringProvider},
    MasterKey, SecureRecordStore, StoreConfig,
};
use tracing::debug;

/// Environment variable holding a hex or base64 master key; takes precedence over the keyring.
pub const MASTER_KEY_ENV: &str = "SLOTVAULT_MASTER_KEY";

pub type CliStore = SecureRecordStore<Box<dyn KeyValueBackend>>;

/// Resolve the durable slot directory (config override first).
pub fn data_dir(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(root) => Ok(root.clone()),
        None => default_root().map_err(|e| eyre!(e.to_string())),
    }
}

/// Key source when no key is given in the environment: the OS keychain, or a
/// throwaway key for session stores so they never touch the keychain.
pub fn key_provider(config: &Config, session: bool) -> Box<dyn KeyProvider> {
    if session {
        Box::new(InMemoryKeyProvider::default())
    } else {
        Box::new(KeyringProvider::new(config.key_service(), config.key_account()))
    }
}

/// Fetch the master key from the environment, falling back to [`key_provider`].
pub async fn resolve_master_key(config: &Config, session: bool) -> Result<MasterKey> {
    if let Ok(encoded) = std::env::var(MASTER_KEY_ENV) {
        debug!("using master key from {MASTER_KEY_ENV}");
        return MasterKey::parse(&encoded)
            .map(|key| key.with_id("env"))
            .map_err(|e| eyre!(e.to_string()));
    }

    key_provider(config, session)
        .get_or_create()
        .await
        .map_err(|e| eyre!(e.to_string()))
}

/// Build a record store over the durable backend, or an in-memory one when `session` is set.
pub fn build_store(config: &Config, master_key: MasterKey, session: bool) -> Result<CliStore> {
    let backend: Box<dyn KeyValueBackend> = if session {
        debug!("initializing session record store");
        Box::new(MemoryBackend::new())
    } else {
        let root = data_dir(config)?;
        debug!(?root, "initializing durable record store");
        Box::new(FileBackend::new(root))
    };

    let mut store_config = StoreConfig::new(master_key, backend);
    if let Some(separator) = &config.domain_separator {
        store_config = store_config.with_domain_separator(separator.clone());
    }
    SecureRecordStore::from_config(store_config).map_err(|e| eyre!(e.to_string()))
}

pub async fn store_from_config(config: &Config, session: bool) -> Result<CliStore> {
    let master_key = resolve_master_key(config, session).await?;
    build_store(config, master_key, session)
}

/// Helper for tests to construct a store rooted at a temp dir with a fixed key.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> CliStore {
    let config = Config {
        data_dir: Some(root.into()),
        ..Config::default()
    };
    build_store(&config, MasterKey::new("test", [9u8; 32]), false).expect("test store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durable_store_writes_under_configured_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = test_store(dir.path());
        store.put("k", "v").expect("put");
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 2);
    }

    #[test]
    fn configured_separator_is_applied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            domain_separator: Some("#auth".into()),
            key: None,
        };
        let store = build_store(&config, MasterKey::new("test", [9u8; 32]), true).expect("build");
        assert_eq!(store.domain_separator(), "#auth");
        // session stores never touch the data dir
        store.put("k", "v").expect("put");
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }

    #[tokio::test]
    async fn session_key_provider_generates_in_memory() {
        let provider = key_provider(&Config::default(), true);
        let key = provider.get_or_create().await.expect("session key");
        assert_eq!(key.id, "default");

        let again = provider.get_or_create().await.expect("session key");
        assert_eq!(key.as_bytes(), again.as_bytes());
    }
}
