//! Configuration resolution for albumlog-sync
//!
//! Provides multi-tier resolution of the Spotify access token and the user
//! id with CLI → ENV → TOML priority.

use albumlog_common::config::TomlConfig;
use albumlog_common::{Error, Result};
use tracing::{info, warn};

/// Environment variable holding the Spotify access token
pub const SPOTIFY_TOKEN_ENV: &str = "ALBUMLOG_SPOTIFY_TOKEN";

/// Resolve the Spotify access token
///
/// **Priority:** CLI → ENV (`ALBUMLOG_SPOTIFY_TOKEN`) → TOML
pub fn resolve_access_token(cli_token: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    let env_token = std::env::var(SPOTIFY_TOKEN_ENV).ok();
    let toml_token = toml_config.spotify.access_token.as_deref();

    let candidates = [
        ("command line", cli_token),
        ("environment", env_token.as_deref()),
        ("TOML", toml_token),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, token)| token.is_some_and(is_valid_key))
        .map(|(source, _)| *source)
        .collect();

    if sources.len() > 1 {
        warn!(
            "Spotify access token found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (source, token) in candidates {
        if let Some(token) = token.filter(|t| is_valid_key(t)) {
            info!("Spotify access token loaded from {}", source);
            return Ok(token.trim().to_string());
        }
    }

    Err(Error::Config(format!(
        "Spotify access token not configured. Provide one of:\n\
         1. Command line: --token <token>\n\
         2. Environment: {}=<token>\n\
         3. TOML config: [spotify] access_token = \"<token>\"",
        SPOTIFY_TOKEN_ENV
    )))
}

/// Resolve the user id: CLI first, then the TOML `[sync] user_id`
pub fn resolve_user_id(cli_user: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    cli_user
        .or(toml_config.sync.user_id.as_deref())
        .filter(|u| is_valid_key(u))
        .map(|u| u.trim().to_string())
        .ok_or_else(|| {
            Error::Config("User id not configured. Pass --user or set [sync] user_id in the TOML config".to_string())
        })
}

/// Validate a key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
