use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `~/.config/slotvault/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the durable slot directory.
    pub data_dir: Option<PathBuf>,
    /// Override for the auth-slot domain separator.
    pub domain_separator: Option<String>,
    /// Where the master key lives in the OS keyring.
    pub key: Option<KeyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct KeyConfig {
    pub service: Option<String>,
    pub account: Option<String>,
}

pub const DEFAULT_KEY_SERVICE: &str = "slotvault";
pub const DEFAULT_KEY_ACCOUNT: &str = "master-key";

impl Config {
    pub fn key_service(&self) -> &str {
        self.key
            .as_ref()
            .and_then(|k| k.service.as_deref())
            .unwrap_or(DEFAULT_KEY_SERVICE)
    }

    pub fn key_account(&self) -> &str {
        self.key
            .as_ref()
            .and_then(|k| k.account.as_deref())
            .unwrap_or(DEFAULT_KEY_ACCOUNT)
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("slotvault").join("config.toml"))
}

/// Write the config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_if_missing(config, &default_path()?)
}

/// Write the given config to `path`, creating parent directories as needed.
/// An existing file is left untouched.
pub fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.key_service(), DEFAULT_KEY_SERVICE);
        assert_eq!(cfg.key_account(), DEFAULT_KEY_ACCOUNT);
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            data_dir = "/tmp/slotvault-data"
            domain_separator = "com.example.auth"
            [key]
            service = "example"
            account = "records"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                data_dir: Some(PathBuf::from("/tmp/slotvault-data")),
                domain_separator: Some("com.example.auth".into()),
                key: Some(KeyConfig {
                    service: Some("example".into()),
                    account: Some("records".into()),
                }),
            }
        );
        assert_eq!(cfg.key_service(), "example");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "  \n").expect("write");
        assert_eq!(load_from_path(&path).expect("load"), Config::default());
    }

    #[test]
    fn write_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            data_dir: Some(PathBuf::from("/tmp/slotvault-data")),
            domain_separator: None,
            key: None,
        };

        write_if_missing(&cfg, &path).expect("write should succeed");
        let other = Config {
            data_dir: Some(PathBuf::from("/elsewhere")),
            ..Config::default()
        };
        let second = write_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);
        let loaded: Config =
            toml::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(loaded, cfg);
    }
}
