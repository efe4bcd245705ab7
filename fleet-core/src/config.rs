//! Configuration types
//!
//! Loaded from environment variables with defaults suitable for a desktop
//! session. Call [`FleetConfig::validate`] before handing the config to the
//! rest of the system.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FleetError, FleetResult};

/// Response cache bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Lifetime of each entry from insertion.
    pub ttl: Duration,
    /// Maximum entry count; 0 means unlimited (TTL is the only bound).
    pub max_entries: usize,
    /// Interval of the background expiry sweep; zero disables it.
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_entries: 1000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Timeouts applied to authorization backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzSettings {
    /// Ceiling for a single cache-guard check when the caller has no deadline.
    pub check_timeout: Duration,
    /// Bound on one capability batch (client connect + review).
    pub batch_timeout: Duration,
}

impl Default for AuthzSettings {
    fn default() -> Self {
        Self {
            check_timeout: Duration::from_secs(2),
            batch_timeout: Duration::from_secs(5),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                field: "log_format".to_string(),
                value: other.to_string(),
                reason: "expected 'pretty' or 'json'".to_string(),
            }),
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
    pub log_format: LogFormat,
    /// Upper bound on a single resource fetch.
    pub fetch_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7373".to_string(),
            log_format: LogFormat::Pretty,
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    pub cache: CacheSettings,
    pub authz: AuthzSettings,
    pub server: ServerSettings,
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl FleetConfig {
    /// Create FleetConfig from environment variables.
    ///
    /// Environment variables:
    /// - `FLEET_CACHE_TTL_SECS`: Cache entry lifetime (default: 30)
    /// - `FLEET_CACHE_MAX_ENTRIES`: Cache capacity, 0 = unlimited (default: 1000)
    /// - `FLEET_CACHE_SWEEP_SECS`: Expiry sweep interval, 0 = off (default: 60)
    /// - `FLEET_AUTHZ_CHECK_TIMEOUT_MS`: Guard check ceiling (default: 2000)
    /// - `FLEET_AUTHZ_BATCH_TIMEOUT_MS`: Capability batch bound (default: 5000)
    /// - `FLEET_FETCH_TIMEOUT_SECS`: Resource fetch bound (default: 15)
    /// - `FLEET_API_BIND` / `PORT`: Bind host and port (default: 127.0.0.1:7373)
    /// - `FLEET_LOG_FORMAT`: "pretty" or "json" (default: pretty)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache = CacheSettings {
            ttl: env_parse("FLEET_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache.ttl),
            max_entries: env_parse("FLEET_CACHE_MAX_ENTRIES")
                .unwrap_or(defaults.cache.max_entries),
            sweep_interval: env_parse("FLEET_CACHE_SWEEP_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache.sweep_interval),
        };

        let authz = AuthzSettings {
            check_timeout: env_parse("FLEET_AUTHZ_CHECK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.authz.check_timeout),
            batch_timeout: env_parse("FLEET_AUTHZ_BATCH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.authz.batch_timeout),
        };

        let host = std::env::var("FLEET_API_BIND").ok();
        let port: Option<u16> = env_parse("PORT");
        let bind = match (host, port) {
            (Some(host), Some(port)) if !host.contains(':') => format!("{}:{}", host, port),
            (Some(host), _) => host,
            (None, Some(port)) => format!("127.0.0.1:{}", port),
            (None, None) => defaults.server.bind.clone(),
        };

        let server = ServerSettings {
            bind,
            log_format: env_parse("FLEET_LOG_FORMAT").unwrap_or(defaults.server.log_format),
            fetch_timeout: env_parse("FLEET_FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.server.fetch_timeout),
        };

        Self {
            cache,
            authz,
            server,
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - cache TTL is positive (expiry is the one bound that is never optional)
    /// - every timeout is positive
    /// - bind address is non-empty
    pub fn validate(&self) -> FleetResult<()> {
        let positive = [
            ("cache.ttl", self.cache.ttl),
            ("authz.check_timeout", self.authz.check_timeout),
            ("authz.batch_timeout", self.authz.batch_timeout),
            ("server.fetch_timeout", self.server.fetch_timeout),
        ];
        for (field, value) in positive {
            if value.is_zero() {
                return Err(FleetError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: format!("{:?}", value),
                    reason: format!("{} must be positive", field),
                }));
            }
        }

        if self.server.bind.trim().is_empty() {
            return Err(FleetError::Config(ConfigError::MissingRequired {
                field: "server.bind".to_string(),
            }));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FleetConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = FleetConfig::default();
        config.cache.ttl = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.ttl"));
    }

    #[test]
    fn test_zero_capacity_is_unlimited_and_valid() {
        let mut config = FleetConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_check_timeout_rejected() {
        let mut config = FleetConfig::default();
        config.authz.check_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(FleetError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_blank_bind_rejected() {
        let mut config = FleetConfig::default();
        config.server.bind = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(FleetError::Config(ConfigError::MissingRequired { .. }))
        ));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
