//! Shared configuration loader for Reverie services
//!
//! Environment variable parsing with typed values, .env file support via
//! dotenvy, and validation with clear error messages. All configuration uses
//! the `REVERIE_` prefix, with fallbacks to the conventional bare names
//! (`DATABASE_URL`, `PORT`, `RUST_LOG`).
//!
//! Override hierarchy: defaults < .env < environment.

use crate::error::ReverieError;
use std::time::Duration;
use url::Url;

/// Configuration loader trait
///
/// Standardized load-then-validate lifecycle for configuration structs.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables, applying defaults for
    /// missing optional values.
    fn from_env() -> Result<Self, ReverieError>;

    /// Validate configuration values (URL formats, port ranges, positive
    /// counts).
    fn validate(&self) -> Result<(), ReverieError>;
}

/// Database configuration
///
/// # Environment Variables
///
/// - `REVERIE_DATABASE_URL` (or `DATABASE_URL`, required): PostgreSQL URL
/// - `REVERIE_DATABASE_MAX_CONNECTIONS` (optional, default 20)
/// - `REVERIE_DATABASE_MIN_CONNECTIONS` (optional, default 2)
/// - `REVERIE_DATABASE_CONNECT_TIMEOUT` (optional, seconds, default 30)
/// - `REVERIE_DATABASE_IDLE_TIMEOUT` (optional, seconds, default 600)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/reverie".to_string(),
            max_connections: 20,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl ConfigLoader for DatabaseConfig {
    fn from_env() -> Result<Self, ReverieError> {
        let url = std::env::var("REVERIE_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ReverieError::Configuration {
                message: "DATABASE_URL or REVERIE_DATABASE_URL must be set".to_string(),
                key: Some("REVERIE_DATABASE_URL".to_string()),
            })?;

        let max_connections = parse_env_var(
            "REVERIE_DATABASE_MAX_CONNECTIONS",
            DatabaseConfig::default().max_connections,
        )?;

        let min_connections = parse_env_var(
            "REVERIE_DATABASE_MIN_CONNECTIONS",
            DatabaseConfig::default().min_connections,
        )?;

        let connect_timeout_secs = parse_env_var("REVERIE_DATABASE_CONNECT_TIMEOUT", 30u64)?;
        let idle_timeout_secs = parse_env_var("REVERIE_DATABASE_IDLE_TIMEOUT", 600u64)?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
        })
    }

    fn validate(&self) -> Result<(), ReverieError> {
        Url::parse(&self.url).map_err(|e| ReverieError::Configuration {
            message: format!("Invalid DATABASE_URL: {}", e),
            key: Some("REVERIE_DATABASE_URL".to_string()),
        })?;

        if self.max_connections == 0 {
            return Err(ReverieError::Configuration {
                message: "max_connections must be greater than 0".to_string(),
                key: Some("REVERIE_DATABASE_MAX_CONNECTIONS".to_string()),
            });
        }

        if self.min_connections > self.max_connections {
            return Err(ReverieError::Configuration {
                message: format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
                key: Some("REVERIE_DATABASE_MIN_CONNECTIONS".to_string()),
            });
        }

        Ok(())
    }
}

/// Service configuration
///
/// # Environment Variables
///
/// - `REVERIE_SERVICE_HOST` (or `HOST`, optional, default "0.0.0.0")
/// - `REVERIE_SERVICE_PORT` (or `PORT`, optional, default 8084)
/// - `REVERIE_SERVICE_LOG_LEVEL` (or `RUST_LOG`, optional, default "info")
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8084,
            log_level: "info".to_string(),
        }
    }
}

impl ConfigLoader for ServiceConfig {
    fn from_env() -> Result<Self, ReverieError> {
        let host = std::env::var("REVERIE_SERVICE_HOST")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| ServiceConfig::default().host);

        let port = parse_env_var("REVERIE_SERVICE_PORT", ServiceConfig::default().port)
            .or_else(|_| parse_env_var("PORT", ServiceConfig::default().port))?;

        let log_level = std::env::var("REVERIE_SERVICE_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| ServiceConfig::default().log_level);

        Ok(Self {
            host,
            port,
            log_level,
        })
    }

    fn validate(&self) -> Result<(), ReverieError> {
        if self.port == 0 {
            return Err(ReverieError::Configuration {
                message: "port must be greater than 0".to_string(),
                key: Some("REVERIE_SERVICE_PORT".to_string()),
            });
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ReverieError::Configuration {
                message: format!(
                    "Invalid log_level '{}'. Must be one of: {}",
                    self.log_level,
                    valid_log_levels.join(", ")
                ),
                key: Some("REVERIE_SERVICE_LOG_LEVEL".to_string()),
            });
        }

        Ok(())
    }
}

/// Bandit engine tuning
///
/// # Environment Variables
///
/// - `REVERIE_BANDIT_ALPHA` (optional, default 1.0)
/// - `REVERIE_BANDIT_MIN_USER_UPDATES` (optional, default 10)
/// - `REVERIE_BANDIT_CACHE_SIZE` (optional, default 500)
/// - `REVERIE_BANDIT_FLUSH_THRESHOLD` (optional, default 10)
#[derive(Debug, Clone)]
pub struct BanditConfig {
    /// Exploration parameter carried in model state
    pub alpha: f64,
    /// Minimum updates before the per-user model participates in selection
    pub min_user_updates: u64,
    /// Maximum number of user models held in memory
    pub cache_size: usize,
    /// Number of updates between dirty-model flushes
    pub flush_threshold: u32,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            min_user_updates: 10,
            cache_size: 500,
            flush_threshold: 10,
        }
    }
}

impl ConfigLoader for BanditConfig {
    fn from_env() -> Result<Self, ReverieError> {
        let defaults = BanditConfig::default();
        Ok(Self {
            alpha: parse_env_var("REVERIE_BANDIT_ALPHA", defaults.alpha)?,
            min_user_updates: parse_env_var(
                "REVERIE_BANDIT_MIN_USER_UPDATES",
                defaults.min_user_updates,
            )?,
            cache_size: parse_env_var("REVERIE_BANDIT_CACHE_SIZE", defaults.cache_size)?,
            flush_threshold: parse_env_var(
                "REVERIE_BANDIT_FLUSH_THRESHOLD",
                defaults.flush_threshold,
            )?,
        })
    }

    fn validate(&self) -> Result<(), ReverieError> {
        if self.cache_size == 0 {
            return Err(ReverieError::Configuration {
                message: "cache_size must be greater than 0".to_string(),
                key: Some("REVERIE_BANDIT_CACHE_SIZE".to_string()),
            });
        }

        if self.flush_threshold == 0 {
            return Err(ReverieError::Configuration {
                message: "flush_threshold must be greater than 0".to_string(),
                key: Some("REVERIE_BANDIT_FLUSH_THRESHOLD".to_string()),
            });
        }

        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ReverieError::Configuration {
                message: format!("alpha must be finite and non-negative, got {}", self.alpha),
                key: Some("REVERIE_BANDIT_ALPHA".to_string()),
            });
        }

        Ok(())
    }
}

/// Helper function to parse an environment variable with a default value
fn parse_env_var<T>(key: &str, default: T) -> Result<T, ReverieError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>().map_err(|e| ReverieError::Configuration {
                message: format!("Failed to parse {}: {}", key, e),
                key: Some(key.to_string()),
            })
        })
        .unwrap_or(Ok(default))
}

/// Load .env file if present
///
/// Does not return an error if the .env file is missing.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_config_rejects_bad_url() {
        let config = DatabaseConfig {
            url: "not a url".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_service_config_rejects_bad_log_level() {
        let config = ServiceConfig {
            log_level: "verbose".to_string(),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bandit_config_defaults() {
        let config = BanditConfig::default();
        assert_eq!(config.cache_size, 500);
        assert_eq!(config.flush_threshold, 10);
        assert_eq!(config.min_user_updates, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bandit_config_rejects_zero_cache() {
        let config = BanditConfig {
            cache_size: 0,
            ..BanditConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
