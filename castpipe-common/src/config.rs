//! Configuration loading and resolution
//!
//! Every tunable of the ingest service is resolved once at process start
//! into an [`IngestConfig`] and passed by reference into the components.
//! Resolution priority: explicit path argument > environment variable >
//! TOML config file > compiled default.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Key the rendered feed document is published under. Overwritten wholesale
/// on every successful batch.
pub const PUBLISH_KEY: &str = "feed.rss";

/// Namespace prefix of canonical (already-processed) episode objects.
pub const PROCESSED_PREFIX: &str = "processed/";

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5740";
const DEFAULT_LIST_PAGE_SIZE: usize = 1000;
const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 10;

/// Raw TOML configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Public base URL used to build episode enclosure links
    pub base_url: Option<String>,
    /// WebSocket endpoint of the title-voting service
    pub showbot_url: Option<String>,
    /// Root directory of the filesystem-backed object store
    pub store_root: Option<String>,
    /// HTTP listen address of the ingest service
    pub listen_addr: Option<String>,
    /// Objects returned per store listing page
    pub list_page_size: Option<usize>,
    /// Deadline in seconds applied to each voting-service call
    pub resolver_timeout_secs: Option<u64>,
}

/// Resolved ingest service configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Public base URL used to build episode enclosure links
    pub base_url: String,
    /// WebSocket endpoint of the title-voting service
    pub showbot_url: String,
    /// Key of the published feed document
    pub publish_key: String,
    /// Prefix of the canonical episode namespace
    pub processed_prefix: String,
    /// HTTP listen address
    pub listen_addr: String,
    /// Root directory of the filesystem-backed object store
    pub store_root: PathBuf,
    /// Objects returned per store listing page
    pub list_page_size: usize,
    /// Deadline applied to each blocking voting-service step
    pub resolver_timeout: Duration,
}

impl IngestConfig {
    /// Load configuration from an optional explicit TOML path, the default
    /// config file locations, and `CASTPIPE_*` environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let toml_config = match config_path {
            Some(path) => read_toml_config(path)?,
            None => match default_config_file() {
                Some(path) => read_toml_config(&path)?,
                None => TomlConfig::default(),
            },
        };
        Self::resolve(toml_config)
    }

    /// Resolve the final configuration from a parsed TOML layer plus the
    /// environment. Required settings with no value in either source fail
    /// with a configuration error naming every accepted source.
    pub fn resolve(toml_config: TomlConfig) -> Result<Self> {
        let base_url = resolve_required(
            "base_url",
            "CASTPIPE_BASE_URL",
            toml_config.base_url.as_deref(),
        )?;
        let showbot_url = resolve_required(
            "showbot_url",
            "CASTPIPE_SHOWBOT_URL",
            toml_config.showbot_url.as_deref(),
        )?;

        let store_root = std::env::var("CASTPIPE_STORE_ROOT")
            .ok()
            .or(toml_config.store_root)
            .map(PathBuf::from)
            .unwrap_or_else(default_store_root);

        let listen_addr = std::env::var("CASTPIPE_LISTEN_ADDR")
            .ok()
            .or(toml_config.listen_addr)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        let list_page_size = match std::env::var("CASTPIPE_LIST_PAGE_SIZE") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("CASTPIPE_LIST_PAGE_SIZE is not a number: {raw}"))
            })?,
            Err(_) => toml_config
                .list_page_size
                .unwrap_or(DEFAULT_LIST_PAGE_SIZE),
        };
        if list_page_size == 0 {
            return Err(Error::Config(
                "list_page_size must be greater than zero".to_string(),
            ));
        }

        let resolver_timeout_secs = match std::env::var("CASTPIPE_RESOLVER_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Config(format!(
                    "CASTPIPE_RESOLVER_TIMEOUT_SECS is not a number: {raw}"
                ))
            })?,
            Err(_) => toml_config
                .resolver_timeout_secs
                .unwrap_or(DEFAULT_RESOLVER_TIMEOUT_SECS),
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            showbot_url,
            publish_key: PUBLISH_KEY.to_string(),
            processed_prefix: PROCESSED_PREFIX.to_string(),
            listen_addr,
            store_root,
            list_page_size,
            resolver_timeout: Duration::from_secs(resolver_timeout_secs),
        })
    }
}

/// Resolve a required setting from ENV then TOML, warning when both are set.
fn resolve_required(key: &str, env_var: &str, toml_value: Option<&str>) -> Result<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.trim().is_empty());
    let toml_value = toml_value.map(str::to_string).filter(|v| !v.trim().is_empty());

    if env_value.is_some() && toml_value.is_some() {
        tracing::warn!(
            setting = key,
            "setting present in both environment and TOML; using environment"
        );
    }

    env_value.or(toml_value).ok_or_else(|| {
        Error::Config(format!(
            "{key} not configured. Set one of:\n\
             1. Environment: {env_var}=...\n\
             2. TOML config: {key} = \"...\" (~/.config/castpipe/config.toml)"
        ))
    })
}

fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
}

/// Locate the default configuration file, if any exists.
fn default_config_file() -> Option<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("castpipe").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/castpipe/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// OS-dependent default root folder for the filesystem-backed store
fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("castpipe"))
        .unwrap_or_else(|| PathBuf::from("./castpipe_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "CASTPIPE_BASE_URL",
            "CASTPIPE_SHOWBOT_URL",
            "CASTPIPE_STORE_ROOT",
            "CASTPIPE_LISTEN_ADDR",
            "CASTPIPE_LIST_PAGE_SIZE",
            "CASTPIPE_RESOLVER_TIMEOUT_SECS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn resolves_from_toml_with_defaults() {
        clear_env();
        let toml_config: TomlConfig = toml::from_str(
            r#"
            base_url = "https://episodes.example.com/"
            showbot_url = "ws://showbot.example.com/"
            "#,
        )
        .unwrap();

        let config = IngestConfig::resolve(toml_config).unwrap();
        assert_eq!(config.base_url, "https://episodes.example.com");
        assert_eq!(config.showbot_url, "ws://showbot.example.com/");
        assert_eq!(config.publish_key, "feed.rss");
        assert_eq!(config.processed_prefix, "processed/");
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.list_page_size, DEFAULT_LIST_PAGE_SIZE);
        assert_eq!(
            config.resolver_timeout,
            Duration::from_secs(DEFAULT_RESOLVER_TIMEOUT_SECS)
        );
    }

    #[test]
    #[serial]
    fn loads_from_an_explicit_config_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            base_url = "https://file.example.com"
            showbot_url = "ws://showbot.example.com/"
            listen_addr = "0.0.0.0:8080"
            "#,
        )
        .unwrap();

        let config = IngestConfig::load(Some(&path)).unwrap();
        assert_eq!(config.base_url, "https://file.example.com");
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    #[serial]
    fn unreadable_config_file_is_a_config_error() {
        clear_env();
        let err = IngestConfig::load(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[serial]
    fn environment_overrides_toml() {
        clear_env();
        std::env::set_var("CASTPIPE_BASE_URL", "https://env.example.com");
        std::env::set_var("CASTPIPE_LIST_PAGE_SIZE", "25");
        let toml_config: TomlConfig = toml::from_str(
            r#"
            base_url = "https://toml.example.com"
            showbot_url = "ws://showbot.example.com/"
            list_page_size = 7
            "#,
        )
        .unwrap();

        let config = IngestConfig::resolve(toml_config).unwrap();
        assert_eq!(config.base_url, "https://env.example.com");
        assert_eq!(config.list_page_size, 25);
        clear_env();
    }

    #[test]
    #[serial]
    fn missing_required_setting_is_a_config_error() {
        clear_env();
        let err = IngestConfig::resolve(TomlConfig::default()).unwrap_err();
        match err {
            Error::Config(message) => assert!(message.contains("base_url")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn zero_page_size_is_rejected() {
        clear_env();
        let toml_config: TomlConfig = toml::from_str(
            r#"
            base_url = "https://episodes.example.com"
            showbot_url = "ws://showbot.example.com/"
            list_page_size = 0
            "#,
        )
        .unwrap();
        assert!(IngestConfig::resolve(toml_config).is_err());
    }
}
