//! Configuration loading and root folder resolution
//!
//! The TOML file is bootstrap-only: it names the root folder (where the
//! SQLite database lives), logging, Spotify client and sync defaults.
//! Anything given on the command line or in the environment wins over it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "ALBUMLOG_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "albumlog.db";

/// Default Spotify Web API base URL
pub const DEFAULT_SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub spotify: SpotifyConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// Spotify Web API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// Bearer access token (obtained and refreshed outside albumlog)
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Minimum interval between requests
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base_url: default_api_base_url(),
            rate_limit_ms: default_rate_limit_ms(),
        }
    }
}

/// Sync defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Default user id when none is given on the command line
    #[serde(default)]
    pub user_id: Option<String>,

    /// Number of plays requested per fetch (the API caps this at 50)
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,

    /// Maximum time spent retrying a locked database write
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            fetch_limit: default_fetch_limit(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_SPOTIFY_API_BASE_URL.to_string()
}

fn default_rate_limit_ms() -> u64 {
    100
}

fn default_fetch_limit() -> u32 {
    50
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

/// Load TOML configuration from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load TOML configuration from the given path, or the platform default if it exists.
///
/// A missing default file is not an error: built-in defaults are returned.
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit_path {
        return load_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => load_toml_config(&path),
        _ => Ok(TomlConfig::default()),
    }
}

/// Write configuration to TOML (used to seed a starter config file)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}

/// Default configuration file path for the platform (`<config_dir>/albumlog/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("albumlog").join("config.toml"))
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable (`ALBUMLOG_ROOT_FOLDER`)
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("albumlog"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\albumlog"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("albumlog"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/albumlog"))
    } else {
        // ~/.local/share/albumlog
        dirs::data_local_dir()
            .map(|d| d.join("albumlog"))
            .unwrap_or_else(|| PathBuf::from("./albumlog_data"))
    }
}
