//! Layered service configuration.
//!
//! Defaults, then an optional TOML file, then environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable names.
pub mod env_vars {
    pub const HTTP_ADDR: &str = "HTTP_ADDR";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_JSON: &str = "LOG_JSON";
    pub const SHUTDOWN_TIMEOUT: &str = "SHUTDOWN_TIMEOUT";
    pub const HTTP_REQUEST_TIMEOUT: &str = "HTTP_REQUEST_TIMEOUT";
    pub const DB_PATH: &str = "DB_PATH";
    pub const DB_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
    pub const DB_BUSY_TIMEOUT: &str = "DB_BUSY_TIMEOUT";
    pub const API_KEY: &str = "API_KEY";
    pub const COMMAND_ACK_TIMEOUT: &str = "COMMAND_ACK_TIMEOUT";
    pub const COMMAND_SWEEP_INTERVAL: &str = "COMMAND_SWEEP_INTERVAL";
    pub const COMMAND_SWEEPER_ENABLED: &str = "COMMAND_SWEEPER_ENABLED";
}

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub commands: CommandsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
    #[serde(with = "duration")]
    pub shutdown_timeout: Duration,
    #[serde(with = "duration")]
    pub request_timeout: Duration,
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            shutdown_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(8),
            body_limit: 1024 * 1024,
        }
    }
}

impl HttpConfig {
    /// The bind address, with a bare `:port` widened to all interfaces.
    pub fn bind_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file, or `:memory:` for a non-persistent store.
    pub path: String,
    pub max_connections: usize,
    #[serde(with = "duration")]
    pub busy_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/smarthome.redb".to_string(),
            max_connections: 10,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: "devkey".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// How long a command may stay pending before it is timed out.
    #[serde(with = "duration")]
    pub ack_timeout: Duration,
    #[serde(with = "duration")]
    pub sweep_interval: Duration,
    pub sweeper_enabled: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
            sweeper_enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            log: LogConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            commands: CommandsConfig::default(),
        }
    }
}

impl Config {
    /// Load from the given file (or `config.toml` if present), then apply the
    /// process environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Override fields from environment variables resolved through `lookup`.
    /// Unparsable values are logged and ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get(env_vars::HTTP_ADDR) {
            self.http.addr = v;
        }
        if let Some(v) = get(env_vars::LOG_LEVEL) {
            self.log.level = v;
        }
        if let Some(v) = get(env_vars::LOG_JSON) {
            set_parsed(&mut self.log.json, env_vars::LOG_JSON, &v, parse_bool);
        }
        if let Some(v) = get(env_vars::SHUTDOWN_TIMEOUT) {
            set_parsed(
                &mut self.http.shutdown_timeout,
                env_vars::SHUTDOWN_TIMEOUT,
                &v,
                parse_duration,
            );
        }
        if let Some(v) = get(env_vars::HTTP_REQUEST_TIMEOUT) {
            set_parsed(
                &mut self.http.request_timeout,
                env_vars::HTTP_REQUEST_TIMEOUT,
                &v,
                parse_duration,
            );
        }
        if let Some(v) = get(env_vars::DB_PATH) {
            self.storage.path = v;
        }
        if let Some(v) = get(env_vars::DB_MAX_CONNECTIONS) {
            set_parsed(
                &mut self.storage.max_connections,
                env_vars::DB_MAX_CONNECTIONS,
                &v,
                |s| s.parse().ok(),
            );
        }
        if let Some(v) = get(env_vars::DB_BUSY_TIMEOUT) {
            set_parsed(
                &mut self.storage.busy_timeout,
                env_vars::DB_BUSY_TIMEOUT,
                &v,
                parse_duration,
            );
        }
        if let Some(v) = get(env_vars::API_KEY) {
            self.auth.api_key = v;
        }
        if let Some(v) = get(env_vars::COMMAND_ACK_TIMEOUT) {
            set_parsed(
                &mut self.commands.ack_timeout,
                env_vars::COMMAND_ACK_TIMEOUT,
                &v,
                parse_duration,
            );
        }
        if let Some(v) = get(env_vars::COMMAND_SWEEP_INTERVAL) {
            set_parsed(
                &mut self.commands.sweep_interval,
                env_vars::COMMAND_SWEEP_INTERVAL,
                &v,
                parse_duration,
            );
        }
        if let Some(v) = get(env_vars::COMMAND_SWEEPER_ENABLED) {
            set_parsed(
                &mut self.commands.sweeper_enabled,
                env_vars::COMMAND_SWEEPER_ENABLED,
                &v,
                parse_bool,
            );
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.api_key must not be empty".into()));
        }
        if self.storage.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "storage.max_connections must be at least 1".into(),
            ));
        }
        if self.http.addr.trim().is_empty() {
            return Err(ConfigError::Invalid("http.addr must not be empty".into()));
        }
        let intervals = [
            ("http.request_timeout", self.http.request_timeout),
            ("storage.busy_timeout", self.storage.busy_timeout),
            ("commands.ack_timeout", self.commands.ack_timeout),
            ("commands.sweep_interval", self.commands.sweep_interval),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}

fn set_parsed<T>(slot: &mut T, key: &str, raw: &str, parse: impl Fn(&str) -> Option<T>) {
    match parse(raw) {
        Some(value) => *slot = value,
        None => tracing::warn!(
            category = "config",
            key,
            value = raw,
            "invalid_env_value_using_default"
        ),
    }
}

/// Parse `1500ms` / `10s` / `2m` style durations, or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Serde adapter for durations written as humantime strings or seconds.
mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid duration `{text}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.addr, "0.0.0.0:8080");
        assert_eq!(config.storage.max_connections, 10);
        assert_eq!(config.storage.busy_timeout, Duration::from_secs(5));
        assert_eq!(config.commands.ack_timeout, Duration::from_secs(30));
        assert_eq!(config.auth.api_key, "devkey");
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = Config::default();
        config.apply_env_with(env(&[
            ("HTTP_ADDR", ":9090"),
            ("SHUTDOWN_TIMEOUT", "1500ms"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("COMMAND_ACK_TIMEOUT", "2m"),
            ("LOG_JSON", "false"),
            ("API_KEY", "secret"),
        ]));
        assert_eq!(config.http.bind_addr(), "0.0.0.0:9090");
        assert_eq!(config.http.shutdown_timeout, Duration::from_millis(1500));
        assert_eq!(config.storage.max_connections, 4);
        assert_eq!(config.commands.ack_timeout, Duration::from_secs(120));
        assert!(!config.log.json);
        assert_eq!(config.auth.api_key, "secret");
    }

    #[test]
    fn bad_env_values_keep_defaults() {
        let mut config = Config::default();
        config.apply_env_with(env(&[
            ("SHUTDOWN_TIMEOUT", "soon"),
            ("DB_MAX_CONNECTIONS", "many"),
            ("COMMAND_SWEEPER_ENABLED", "maybe"),
        ]));
        assert_eq!(config.http.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.storage.max_connections, 10);
        assert!(config.commands.sweeper_enabled);
    }

    #[test]
    fn toml_file_layers_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[http]
addr = "127.0.0.1:3000"
request_timeout = "2s"

[storage]
path = ":memory:"
busy_timeout = 1

[commands]
sweeper_enabled = false
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.http.addr, "127.0.0.1:3000");
        assert_eq!(config.http.request_timeout, Duration::from_secs(2));
        assert_eq!(config.http.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.storage.path, ":memory:");
        assert_eq!(config.storage.busy_timeout, Duration::from_secs(1));
        assert!(!config.commands.sweeper_enabled);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::from_file(Path::new("/nonexistent/smarthome.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.auth.api_key = "  ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.commands.sweep_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_duration_accepts_bare_seconds() {
        assert_eq!(parse_duration("15"), Some(Duration::from_secs(15)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("later"), None);
    }
}
