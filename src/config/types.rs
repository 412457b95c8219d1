use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::server::Account;

/// Longest `system_id` that fits the 16-octet C-string field.
const MAX_SYSTEM_ID_LEN: usize = 15;

/// Root configuration for the `serve` command
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server settings
    pub server: ServerConfig,

    /// Accounts allowed to bind
    #[serde(default)]
    pub accounts: Vec<Account>,

    /// Logging settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Server configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("TLS configuration: {0}")]
    Tls(#[source] io::Error),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// System identifier returned in every bind response
    #[serde(default)]
    pub system_id: String,

    /// Listen host
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port. `0` asks the OS for an ephemeral port.
    pub port: Option<u16>,

    /// TLS configuration
    pub tls: Option<TlsConfig>,

    /// What to do after answering an unbind
    #[serde(default)]
    pub unbind_policy: UnbindPolicy,

    /// How to answer commands outside the supported set
    #[serde(default)]
    pub unknown_command_policy: UnknownCommandPolicy,

    /// Time allowed between accept and a successful bind
    #[serde(default = "default_bind_timeout", with = "humantime_serde")]
    pub bind_timeout: Duration,

    /// Time allowed for one handler call
    #[serde(default = "default_handler_timeout", with = "humantime_serde")]
    pub handler_timeout: Duration,
}

impl ServerConfig {
    /// Create a config with the required fields set and defaults elsewhere.
    pub fn new(system_id: impl Into<String>, port: u16) -> Self {
        Self {
            system_id: system_id.into(),
            host: default_host(),
            port: Some(port),
            tls: None,
            unbind_policy: UnbindPolicy::default(),
            unknown_command_policy: UnknownCommandPolicy::default(),
            bind_timeout: default_bind_timeout(),
            handler_timeout: default_handler_timeout(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_unbind_policy(mut self, policy: UnbindPolicy) -> Self {
        self.unbind_policy = policy;
        self
    }

    pub fn with_unknown_command_policy(mut self, policy: UnknownCommandPolicy) -> Self {
        self.unknown_command_policy = policy;
        self
    }

    pub fn with_bind_timeout(mut self, timeout: Duration) -> Self {
        self.bind_timeout = timeout;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system_id.is_empty() {
            return Err(ConfigError::MissingField("system_id"));
        }
        if self.system_id.len() > MAX_SYSTEM_ID_LEN {
            return Err(ConfigError::Invalid {
                field: "system_id",
                reason: format!("longer than {} characters", MAX_SYSTEM_ID_LEN),
            });
        }
        if self.port.is_none() {
            return Err(ConfigError::MissingField("port"));
        }
        if self.host.is_empty() {
            return Err(ConfigError::MissingField("host"));
        }
        for (name, timeout) in [
            ("bind_timeout", self.bind_timeout),
            ("handler_timeout", self.handler_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid {
                    field: name,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if let Some(tls) = &self.tls {
            tls.check_files()?;
        }
        Ok(())
    }
}

/// TLS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM)
    pub cert: PathBuf,

    /// Path to private key file (PEM)
    pub key: PathBuf,
}

impl TlsConfig {
    fn check_files(&self) -> Result<(), ConfigError> {
        for path in [&self.cert, &self.key] {
            if !Path::new(path).is_file() {
                return Err(ConfigError::Tls(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                )));
            }
        }
        Ok(())
    }
}

/// Behavior after answering an unbind request.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnbindPolicy {
    /// Send unbind_resp, then close the session
    #[default]
    Close,
    /// Send unbind_resp and keep reading
    StayBound,
}

/// Handling of commands the server does not implement.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCommandPolicy {
    /// Drop the request without a response
    #[default]
    Ignore,
    /// Answer generic_nack with ESME_RINVCMDID
    GenericNack,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (overridden by `RUST_LOG`)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable structured JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_handler_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Humantime serde support module
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required_fields() {
        let mut config = ServerConfig::new("", 2775);
        assert!(matches!(config.validate(), Err(ConfigError::MissingField("system_id"))));

        config.system_id = "smsc".to_string();
        config.port = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingField("port"))));

        config.port = Some(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_system_id_length() {
        let config = ServerConfig::new("x".repeat(16), 2775);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "system_id", .. })
        ));
    }

    #[test]
    fn test_validate_missing_tls_files() {
        let config = ServerConfig::new("smsc", 2775).with_tls(TlsConfig {
            cert: PathBuf::from("/nonexistent/cert.pem"),
            key: PathBuf::from("/nonexistent/key.pem"),
        });
        assert!(matches!(config.validate(), Err(ConfigError::Tls(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ServerConfig::new("smsc", 2775).with_handler_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "handler_timeout", .. })
        ));
    }
}
