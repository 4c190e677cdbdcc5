//! Configuration loading and root folder resolution
//!
//! Every setting resolves in the same order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: it logs a warning and
//! the defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "KAHI_ROOT_FOLDER";

/// Environment variable overriding the TOML config file location
pub const CONFIG_FILE_ENV: &str = "KAHI_CONFIG";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional log file; stderr when absent
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Contents of `config.toml`
///
/// All fields are optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    /// SQLite database path; `<root_folder>/kahi.db` when absent
    pub database: Option<PathBuf>,
    pub workers: Option<usize>,
    pub ror_url: Option<String>,
    pub doaj_url: Option<String>,
    pub currency_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub registry_score_threshold: Option<f64>,
    /// `stored_wins` or `most_recently_checked`
    pub conflict_policy: Option<String>,
    /// `exclude` or `append`
    pub unmatched_author_policy: Option<String>,
    pub enrichment: Option<bool>,
    /// `staged` (DOAJ dumps in the raw-record table) or `live` (DOAJ API)
    pub oa_registry: Option<String>,
    /// Fixed USD value of one unit per currency; replaces the currency
    /// service when non-empty
    pub usd_rates: BTreeMap<String, f64>,
}

/// Locate the config file: `KAHI_CONFIG`, then the user config dir, then `/etc/kahi`
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!(path = %path.display(), "{} points at a missing file", CONFIG_FILE_ENV);
    }

    if let Some(path) = user_config_path() {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/kahi/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// `<config dir>/kahi/config.toml` for the current user
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kahi").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Load the config file if one exists, otherwise defaults
///
/// An explicit path that fails to parse is still only a warning.
pub fn load_or_default(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit.map(Path::to_path_buf).or_else(find_config_file) {
        Some(path) => path,
        None => {
            debug!("No config file found, using compiled defaults");
            return TomlConfig::default();
        }
    };

    match load_toml_config(&path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration file");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config file, using defaults");
            TomlConfig::default()
        }
    }
}

/// Write a config file atomically (temp file + rename)
///
/// On Unix the file is left with mode 0600.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolve the root folder (data directory)
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

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/kahi
        dirs::data_local_dir()
            .map(|d| d.join("kahi"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/kahi"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("kahi"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/kahi"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("kahi"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\kahi"))
    } else {
        PathBuf::from("./kahi_data")
    }
}

/// Create the root folder if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        info!(path = %path.display(), "Creating root folder");
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str("workers = 3\n").unwrap();
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.logging.level, "info");
        assert!(config.ror_url.is_none());
    }

    #[test]
    fn test_logging_section_parses() {
        let config: TomlConfig = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_usd_rates_table_parses() {
        let config: TomlConfig =
            toml::from_str("oa_registry = \"live\"\n\n[usd_rates]\nEUR = 1.08\nCOP = 0.00025\n").unwrap();
        assert_eq!(config.oa_registry.as_deref(), Some("live"));
        assert_eq!(config.usd_rates.get("EUR"), Some(&1.08));
        assert_eq!(config.usd_rates.len(), 2);
    }

    #[test]
    fn test_default_root_folder_non_empty() {
        assert!(!default_root_folder().as_os_str().is_empty());
    }
}
