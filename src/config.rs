//! Service configuration.
//!
//! Values resolve in three layers: built-in defaults, then an optional TOML
//! file, then environment variables (a `.env` file is loaded into the
//! environment first). The result is validated once at startup so request
//! handling never has to second-guess it.
//!
//! ```toml
//! bind_addr = "0.0.0.0:8080"
//! upstream_base_url = "https://airqino-api.magentalab.it"
//! request_timeout_secs = 10
//! log_level = "info"
//! # log_file = "/var/log/airqino_service.log"
//! strict_readings = false
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::model::DEFAULT_UPSTREAM_BASE_URL;
use crate::translate::ReadingPolicy;

/// Config file read when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "./airqino.toml";

pub const ENV_BIND_ADDR: &str = "AIRQINO_BIND_ADDR";
pub const ENV_UPSTREAM_URL: &str = "AIRQINO_UPSTREAM_URL";
pub const ENV_TIMEOUT_SECS: &str = "AIRQINO_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "AIRQINO_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "AIRQINO_LOG_FILE";
pub const ENV_STRICT_READINGS: &str = "AIRQINO_STRICT_READINGS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to build the upstream HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FacadeConfig {
    pub bind_addr: String,
    pub upstream_base_url: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub log_file: Option<String>,
    pub strict_readings: bool,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            request_timeout_secs: 10,
            log_level: "info".to_string(),
            log_file: None,
            strict_readings: false,
        }
    }
}

impl FacadeConfig {
    /// Parses a TOML document. Keys left out keep their defaults.
    pub fn from_toml_str(text: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Applies overrides from `lookup`, typically `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_BIND_ADDR) {
            self.bind_addr = v;
        }
        if let Some(v) = lookup(ENV_UPSTREAM_URL) {
            self.upstream_base_url = v;
        }
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_TIMEOUT_SECS,
                reason: format!("'{}' is not a whole number of seconds", v),
            })?;
        }
        if let Some(v) = lookup(ENV_LOG_LEVEL) {
            self.log_level = v;
        }
        if let Some(v) = lookup(ENV_LOG_FILE) {
            self.log_file = Some(v).filter(|p| !p.is_empty());
        }
        if let Some(v) = lookup(ENV_STRICT_READINGS) {
            self.strict_readings = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: ENV_STRICT_READINGS,
                        reason: format!("'{}' is not a boolean", v),
                    });
                }
            };
        }
        Ok(())
    }

    /// Checks every value that could otherwise fail at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        let url = reqwest::Url::parse(&self.upstream_base_url).map_err(|e| ConfigError::Invalid {
            key: "upstream_base_url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::Invalid {
                key: "upstream_base_url",
                reason: format!("'{}' is not an absolute http(s) URL", self.upstream_base_url),
            });
        }
        if url.query().is_some() {
            return Err(ConfigError::Invalid {
                key: "upstream_base_url",
                reason: "base URL must not carry a query string".to_string(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr.parse().map_err(|_| ConfigError::Invalid {
            key: "bind_addr",
            reason: format!("'{}' is not a socket address", self.bind_addr),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reading_policy(&self) -> ReadingPolicy {
        if self.strict_readings {
            ReadingPolicy::Strict
        } else {
            ReadingPolicy::Permissive
        }
    }
}

/// Loads configuration from `path` (defaults if the file does not exist),
/// then `.env` and the process environment, and validates the result.
pub fn load_config(path: &str) -> Result<FacadeConfig, ConfigError> {
    let mut config = if Path::new(path).exists() {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        FacadeConfig::from_toml_str(&text, path)?
    } else {
        FacadeConfig::default()
    };

    dotenv::dotenv().ok();
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = FacadeConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.upstream_base_url, "https://airqino-api.magentalab.it");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.reading_policy(), ReadingPolicy::Permissive);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = FacadeConfig::from_toml_str(
            "request_timeout_secs = 3\nstrict_readings = true\n",
            "test.toml",
        )
        .unwrap();
        assert_eq!(config.request_timeout_secs, 3);
        assert!(config.strict_readings);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_unknown_toml_key_is_rejected() {
        let err = FacadeConfig::from_toml_str("cache_ttl = 60\n", "test.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config =
            FacadeConfig::from_toml_str("upstream_base_url = \"http://file:1\"\n", "t").unwrap();
        config
            .apply_env(env(&[
                (ENV_UPSTREAM_URL, "http://env:2"),
                (ENV_TIMEOUT_SECS, "4"),
                (ENV_STRICT_READINGS, "yes"),
            ]))
            .unwrap();
        assert_eq!(config.upstream_base_url, "http://env:2");
        assert_eq!(config.request_timeout_secs, 4);
        assert_eq!(config.reading_policy(), ReadingPolicy::Strict);
    }

    #[test]
    fn test_bad_env_number_is_reported() {
        let mut config = FacadeConfig::default();
        let err = config
            .apply_env(env(&[(ENV_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_TIMEOUT_SECS, .. }));
    }

    #[test]
    fn test_relative_base_url_is_invalid() {
        let config = FacadeConfig {
            upstream_base_url: "airqino-api.magentalab.it".to_string(),
            ..FacadeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_scheme_is_invalid() {
        let config = FacadeConfig {
            upstream_base_url: "ftp://airqino-api.magentalab.it".to_string(),
            ..FacadeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let config = FacadeConfig {
            request_timeout_secs: 0,
            ..FacadeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_client_failure_is_a_startup_error() {
        let source = reqwest::Client::new().get("not a url").build().unwrap_err();
        let err = ConfigError::from(source);
        assert!(matches!(err, ConfigError::HttpClient(_)));
        assert!(err.to_string().starts_with("failed to build the upstream HTTP client"));
    }

    #[test]
    fn test_bad_bind_addr_is_invalid() {
        let config = FacadeConfig {
            bind_addr: "localhost".to_string(),
            ..FacadeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
