//! Configuration loading and path resolution.
//!
//! Each setting resolves in priority order:
//! 1. Command-line flag
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::decisions::DEFAULT_SETTLE;
use crate::error::{MatchError, Result};

/// Environment variable naming the config file.
pub const ENV_CONFIG: &str = "MIMI_MATCH_CONFIG";
/// Environment variable naming the state database.
pub const ENV_STORE: &str = "MIMI_MATCH_STORE";

const APP_DIR: &str = "mimi-match";

/// Contents of `config.toml`.  Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// JSON dataset replacing the bundled one.
    pub dataset: Option<PathBuf>,
    /// SQLite state database.
    pub store: Option<PathBuf>,
    pub settle_ms: Option<u64>,
    /// Fixed shuffle seed for reproducible sessions.
    pub seed: Option<u64>,
}

impl FileConfig {
    pub fn parse(toml_text: &str) -> Result<Self> {
        Ok(toml::from_str(toml_text)?)
    }

    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map_err(|e| {
                MatchError::Config(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub dataset: Option<PathBuf>,
    pub store: Option<PathBuf>,
    pub settle_ms: Option<u64>,
    pub seed: Option<u64>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// `None` means the bundled dataset.
    pub dataset: Option<PathBuf>,
    pub store: PathBuf,
    pub settle: Duration,
    pub seed: Option<u64>,
}

impl AppConfig {
    /// Resolve from flags, the process environment, and the config file.
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        Self::resolve_with_env(overrides, |name| std::env::var(name).ok())
    }

    /// As [`AppConfig::resolve`] with an injectable environment lookup.
    pub fn resolve_with_env(
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let config_path = overrides
            .config
            .clone()
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from))
            .or_else(default_config_path);

        let file = match &config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let store = overrides
            .store
            .or_else(|| env(ENV_STORE).map(PathBuf::from))
            .or(file.store)
            .unwrap_or_else(default_store_path);

        let settle = overrides
            .settle_ms
            .or(file.settle_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SETTLE);

        Ok(Self {
            dataset: overrides.dataset.or(file.dataset),
            store,
            settle,
            seed: overrides.seed.or(file.seed),
        })
    }
}

/// `<config_dir>/mimi-match/config.toml`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// `<data_local_dir>/mimi-match/state.db`, or `./mimi-match-state.db`.
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR).join("state.db"))
        .unwrap_or_else(|| PathBuf::from("mimi-match-state.db"))
}
