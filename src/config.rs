//! Configuration file management for checkhttp.
//!
//! Settings come from three places, later ones winning:
//!
//! 1. Default values
//! 2. Configuration file (`checkhttp.toml` or the one given with `--config`)
//! 3. Command-line arguments
//!
//! # Example Configuration File
//!
//! ```toml
//! hosts = ["example.com", "example.com:8443"]
//! protocol = "https"
//! days = 30
//! timeout = 10
//! output = "text"
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::certificate::DEFAULT_TIMEOUT;
use crate::http::Protocol;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "checkhttp.toml";

/// Certificates expiring within this many days raise a WARNING.
pub const DEFAULT_THRESHOLD_DAYS: i64 = 30;

/// Main configuration structure.
///
/// All fields are optional so partial configurations can be merged.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Hosts to check, optionally as `host:port`
    pub hosts: Option<Vec<String>>,
    /// `http` or `https`
    pub protocol: Option<Protocol>,
    /// Explicit port for the HTTP probe
    pub port: Option<u16>,
    /// Request path for the HTTP probe
    pub path: Option<String>,
    /// Only inspect certificates, skip the HTTP probe
    pub cert_only: Option<bool>,
    /// PEM bundle to inspect instead of live hosts
    pub cert_file: Option<String>,
    /// Expiration warning threshold in days
    pub days: Option<i64>,
    /// Network timeout in seconds
    pub timeout: Option<u64>,
    /// Output format: text or json
    pub output: Option<String>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus Push Gateway settings.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct PrometheusConfig {
    pub enabled: Option<bool>,
    /// Push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// * `ConfigError::Io` - File could not be read
    /// * `ConfigError::Parse` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Default values for every setting except the targets.
    pub fn defaults() -> Self {
        Config {
            hosts: None,
            protocol: Some(Protocol::Https),
            port: None,
            path: None,
            cert_only: Some(false),
            cert_file: None,
            days: Some(DEFAULT_THRESHOLD_DAYS),
            timeout: Some(DEFAULT_TIMEOUT.as_secs()),
            output: Some("text".to_string()),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }

    /// Merges `other` into this configuration; values set in `other` win.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.hosts.is_some() {
            self.hosts = other.hosts;
        }
        if other.protocol.is_some() {
            self.protocol = other.protocol;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.cert_only.is_some() {
            self.cert_only = other.cert_only;
        }
        if other.cert_file.is_some() {
            self.cert_file = other.cert_file;
        }
        if other.days.is_some() {
            self.days = other.days;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Checks values that TOML or clap cannot reject on their own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(days) = self.days {
            if days < 0 {
                return Err(ConfigError::Validation(format!(
                    "days must not be negative, got {}",
                    days
                )));
            }
        }
        if self.timeout == Some(0) {
            return Err(ConfigError::Validation(
                "timeout must be at least one second".to_string(),
            ));
        }
        match self.output.as_deref() {
            None | Some("text") | Some("json") => {}
            Some(other) => {
                return Err(ConfigError::Validation(format!(
                    "output must be text or json, got {}",
                    other
                )))
            }
        }
        if self.port == Some(0) {
            return Err(ConfigError::Validation("port must not be zero".to_string()));
        }
        Ok(())
    }

    pub fn prometheus_enabled(&self) -> bool {
        self.prometheus
            .as_ref()
            .and_then(|p| p.enabled)
            .unwrap_or(false)
    }

    /// An example configuration file with every option set.
    pub fn example_toml() -> String {
        let example = Config {
            hosts: Some(vec![
                "example.com".to_string(),
                "example.com:8443".to_string(),
            ]),
            protocol: Some(Protocol::Https),
            port: None,
            path: Some("/health".to_string()),
            cert_only: Some(false),
            cert_file: None,
            days: Some(DEFAULT_THRESHOLD_DAYS),
            timeout: Some(DEFAULT_TIMEOUT.as_secs()),
            output: Some("text".to_string()),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// File not found, permission denied, etc.
    Io(String),
    /// Invalid TOML syntax or type mismatch
    Parse(String),
    /// Values that parse but make no sense
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
            hosts = ["example.org", "example.net:8443"]
            protocol = "http"
            port = 8080
            path = "/status"
            days = 60
            output = "json"

            [prometheus]
            enabled = true
            address = "http://localhost:9092"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(
            config.hosts,
            Some(vec!["example.org".to_string(), "example.net:8443".to_string()])
        );
        assert_eq!(config.protocol, Some(Protocol::Http));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.path, Some("/status".to_string()));
        assert_eq!(config.days, Some(60));
        assert_eq!(config.timeout, None);
        assert_eq!(config.output, Some("json".to_string()));
        assert!(config.prometheus_enabled());
    }

    #[test]
    fn test_config_merge() {
        let override_config = Config {
            hosts: Some(vec!["override.com".to_string()]),
            cert_only: Some(true),
            days: Some(14),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: None,
            }),
            ..Config::default()
        };

        let merged = Config::defaults().merge_with(override_config);

        assert_eq!(merged.hosts, Some(vec!["override.com".to_string()]));
        assert_eq!(merged.protocol, Some(Protocol::Https));
        assert_eq!(merged.cert_only, Some(true));
        assert_eq!(merged.days, Some(14));
        assert_eq!(merged.timeout, Some(10));

        let prometheus = merged.prometheus.unwrap();
        assert_eq!(prometheus.enabled, Some(true));
        assert_eq!(
            prometheus.address,
            Some("http://localhost:9091".to_string())
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();

        assert_eq!(config.hosts, None);
        assert_eq!(config.days, Some(DEFAULT_THRESHOLD_DAYS));
        assert_eq!(config.output, Some("text".to_string()));
        assert!(!config.prometheus_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            days: Some(-1),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = Config {
            output: Some("yaml".to_string()),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = Config {
            timeout: Some(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"hosts = [invalid toml").unwrap();

        match Config::from_file(temp_file.path()) {
            Err(ConfigError::Parse(_)) => {}
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_example_toml_generation() {
        let parsed: Config = toml::from_str(&Config::example_toml()).unwrap();

        assert!(parsed.hosts.is_some());
        assert_eq!(parsed.path, Some("/health".to_string()));
        assert!(parsed.validate().is_ok());
    }
}
