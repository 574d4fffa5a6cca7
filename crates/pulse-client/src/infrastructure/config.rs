//! TOML-based client configuration.
//!
//! Read from `$XDG_CONFIG_HOME/pulse-client/client.toml`, falling back to
//! `~/.config/pulse-client/client.toml`:
//!
//! ```toml
//! [client]
//! application_name = "mixer"
//! server = "unix:/run/user/1000/pulse/native"
//! log_level = "debug"
//!
//! [timeouts]
//! connect_ms = 2000
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a partial file (or no
//! file at all) still yields a complete [`ClientConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub events: EventConfig,
}

/// Identity and endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSection {
    /// Sent to the server as `application.name`.
    #[serde(default = "default_application_name")]
    pub application_name: String,
    /// Server address; `None` uses `PULSE_SERVER` or the local socket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Auth cookie file; `None` uses `PULSE_COOKIE` or the usual locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_path: Option<PathBuf>,
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Socket connect plus handshake.
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
    /// Per request, from submit until the final reply packet.
    #[serde(default = "default_request_ms")]
    pub request_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventConfig {
    /// Capacity of the subscription event channel.
    #[serde(default = "default_event_buffer")]
    pub buffer: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_application_name() -> String {
    "pulse-client".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_ms() -> u64 {
    5_000
}
fn default_request_ms() -> u64 {
    10_000
}
fn default_event_buffer() -> usize {
    64
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            server: None,
            cookie_path: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            request_ms: default_request_ms(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            buffer: default_event_buffer(),
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("client.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the default path, or defaults if the file is absent.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config from `path`, or defaults if it does not exist.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("pulse-client"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("pulse-client-test-{}", Uuid::new_v4()))
            .join("client.toml")
    }

    #[test]
    fn test_default_timeouts() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.timeouts.connect(), Duration::from_secs(5));
        assert_eq!(cfg.timeouts.request(), Duration::from_secs(10));
        assert_eq!(cfg.events.buffer, 64);
    }

    #[test]
    fn test_default_client_section() {
        let cfg = ClientSection::default();
        assert_eq!(cfg.application_name, "pulse-client");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.server.is_none());
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: ClientConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_deserialize_partial_section_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[client]
server = "tcp:10.0.0.2"
[timeouts]
request_ms = 250
"#;

        // Act
        let cfg: ClientConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.client.server.as_deref(), Some("tcp:10.0.0.2"));
        assert_eq!(cfg.client.application_name, "pulse-client");
        assert_eq!(cfg.timeouts.request_ms, 250);
        assert_eq!(cfg.timeouts.connect_ms, 5_000);
    }

    #[test]
    fn test_none_fields_are_omitted_from_toml() {
        let toml_str = toml::to_string_pretty(&ClientConfig::default()).expect("serialize");
        assert!(!toml_str.contains("server"));
        assert!(!toml_str.contains("cookie_path"));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let result = load_config_from(Path::new("/nonexistent/pulse-client/client.toml"));
        assert_eq!(result.unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        // Arrange
        let path = scratch_path();
        let mut cfg = ClientConfig::default();
        cfg.client.application_name = "mixer".to_string();
        cfg.client.cookie_path = Some(PathBuf::from("/tmp/cookie"));
        cfg.events.buffer = 8;

        // Act
        save_config_to(&path, &cfg).expect("save");
        let restored = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(restored, cfg);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
