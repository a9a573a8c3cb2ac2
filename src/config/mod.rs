//! Server configuration.
//!
//! A [`ServerConfig`] comes from [`Default`], a JSON document, or a JSON file,
//! and can then be overridden from the environment:
//!
//! | Variable                    | Field                |
//! |-----------------------------|----------------------|
//! | `SSRKIT_HOST`               | `host`               |
//! | `SSRKIT_PORT`               | `port`               |
//! | `SSRKIT_MAX_REQUEST_SIZE`   | `max_request_size`   |
//! | `SSRKIT_HANDLER_TIMEOUT_MS` | `handler_timeout_ms` |

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default cap on a buffered request (8 MiB).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },
}

/// Listener and request-handling settings.
///
/// Missing JSON fields fall back to their defaults.
///
/// ```
/// use ssrkit::config::ServerConfig;
///
/// let config = ServerConfig::from_json_str(r#"{ "port": 8080, "handler_timeout_ms": 2000 }"#).unwrap();
/// assert_eq!(config.address(), "0.0.0.0:8080");
/// assert_eq!(config.handler_timeout().unwrap().as_millis(), 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size: usize,
    pub handler_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            handler_timeout_ms: None,
        }
    }
}

impl ServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Apply `SSRKIT_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    // Apply overrides from an arbitrary lookup; split out so tests need not touch the environment.
    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup("SSRKIT_HOST") {
            self.host = host;
        }
        if let Some(port) = parse_var(&lookup, "SSRKIT_PORT")? {
            self.port = port;
        }
        if let Some(size) = parse_var(&lookup, "SSRKIT_MAX_REQUEST_SIZE")? {
            self.max_request_size = size;
        }
        if let Some(ms) = parse_var(&lookup, "SSRKIT_HANDLER_TIMEOUT_MS")? {
            self.handler_timeout_ms = Some(ms);
        }
        Ok(self)
    }

    /// `host:port`, ready for binding.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&'static str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
        None => Ok(None),
    }
}
