//! Bootstrap configuration and root folder resolution
//!
//! The bootstrap TOML holds only what must be known before a run starts:
//! where the data lives, how chatty logging is, and how long a worker may
//! wait on the shared fingerprint ledger. Pipeline parameters (filter
//! cut-offs, montage, ...) live in the JSON parameter tree owned by
//! `prep-stage`, not here.
//!
//! Missing or unreadable TOML never aborts startup; compiled defaults are
//! used instead and a warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the data root folder
pub const ROOT_FOLDER_ENV: &str = "PREP_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the raw recordings (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fingerprint ledger lock settings
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Lock wait budget for the shared fingerprint ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite busy timeout applied per statement
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Total time a worker may keep retrying a locked ledger
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    250
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

impl TomlConfig {
    /// Load bootstrap config from `path`, falling back to defaults
    ///
    /// A missing file is expected on first run and only logged at debug.
    /// A file that exists but does not parse is logged as a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<TomlConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse bootstrap config, using defaults"
                    );
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No bootstrap config, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read bootstrap config, using defaults"
                );
                Self::default()
            }
        }
    }
}

/// Default bootstrap config location (`<config dir>/prep/prep.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("prep").join("prep.toml"))
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `PREP_ROOT_FOLDER` environment variable
/// 3. `root_folder` in the bootstrap TOML
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default data root
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("prep"))
        .unwrap_or_else(|| PathBuf::from("./prep_data"))
}

/// Write bootstrap config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize TOML: {}", e)))?;
    crate::fs::write_atomic_blocking(target, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        assert_eq!(TomlConfig::default().logging.level, "info");
    }

    #[test]
    fn test_ledger_defaults() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.busy_timeout_ms, 250);
        assert_eq!(ledger.max_lock_wait_ms, 5000);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str("root_folder = \"/data/bids\"\n").unwrap();
        assert_eq!(config.root_folder, Some(PathBuf::from("/data/bids")));
        assert_eq!(config.ledger, LedgerConfig::default());
    }

    #[test]
    fn test_cli_arg_wins() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }
}
