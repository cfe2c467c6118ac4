use crate::platform::default_engine_path;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uci_protocol::{EngineOptions, ProtocolError};

pub const ENGINE_PATH_VAR: &str = "STOCKFISH_PATH";
pub const BANNER_VAR: &str = "STOCKFISH_BANNER";
pub const COMMAND_TIMEOUT_VAR: &str = "STOCKFISH_COMMAND_TIMEOUT_MS";
pub const EMIT_SEARCH_LIMITS_VAR: &str = "STOCKFISH_EMIT_SEARCH_LIMITS";

/// Substring of the identification line the engine prints on startup.
pub const DEFAULT_BANNER: &str = "Stockfish";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
    #[error("Cannot read options file {path}: {source}")]
    OptionsFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid options file {path}: {source}")]
    OptionsFormat {
        path: PathBuf,
        source: ProtocolError,
    },
}

/// Settings for one engine session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Engine executable
    pub engine_path: PathBuf,
    /// The startup line must contain this before any command is sent
    pub banner: String,
    /// Per-command deadline; `None` waits forever
    pub command_timeout: Option<Duration>,
    /// Send depth/time/node limits with `go` (they are omitted by default)
    pub emit_search_limits: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            banner: DEFAULT_BANNER.to_string(),
            command_timeout: None,
            emit_search_limits: false,
        }
    }
}

impl SessionConfig {
    pub fn new(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: engine_path.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build configuration from any variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_empty(lookup(ENGINE_PATH_VAR)) {
            config.engine_path = PathBuf::from(path);
        }
        if let Some(banner) = non_empty(lookup(BANNER_VAR)) {
            config.banner = banner;
        }
        if let Some(ms) = non_empty(lookup(COMMAND_TIMEOUT_VAR)) {
            let ms: u64 = ms.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    var: COMMAND_TIMEOUT_VAR.to_string(),
                    reason: e.to_string(),
                }
            })?;
            config.command_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(flag) = non_empty(lookup(EMIT_SEARCH_LIMITS_VAR)) {
            config.emit_search_limits = parse_flag(EMIT_SEARCH_LIMITS_VAR, &flag)?;
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            reason: format!("expected a boolean, got '{}'", value),
        }),
    }
}

/// Read engine options from a JSON object file, e.g. `{"Hash": 16, "Threads": 2}`
pub fn load_engine_options(path: &Path) -> Result<EngineOptions, ConfigError> {
    let json = fs::read_to_string(path).map_err(|source| ConfigError::OptionsFile {
        path: path.to_path_buf(),
        source,
    })?;
    let options =
        EngineOptions::from_json_str(&json).map_err(|source| ConfigError::OptionsFormat {
            path: path.to_path_buf(),
            source,
        })?;
    log::info!(
        "📋 Loaded {} engine option(s) from {}",
        options.len(),
        path.display()
    );
    Ok(options)
}
