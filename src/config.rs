//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL; `None` selects the in-memory store
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub log_format: LogFormat,

    /// Attempts at a conflicting commit before giving up
    pub commit_max_attempts: u32,

    /// Per-attempt load/commit timeout
    pub commit_timeout: Duration,

    /// Default stress forecast horizon
    pub stress_horizon_months: usize,

    /// JSON array of accounts loaded into the in-memory store at startup
    pub seed_accounts_path: Option<String>,

    /// JSON object of income/expense forecasts keyed by account id
    pub forecasts_path: Option<String>,

    /// How often the yearly flex reset job runs
    pub flex_reset_check_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            _ => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        let commit_max_attempts: u32 = parse_or("COMMIT_MAX_ATTEMPTS", 3)?;
        if commit_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("COMMIT_MAX_ATTEMPTS"));
        }

        let stress_horizon_months: usize = parse_or("STRESS_HORIZON_MONTHS", 3)?;
        if stress_horizon_months == 0 {
            return Err(ConfigError::InvalidValue("STRESS_HORIZON_MONTHS"));
        }

        let config = Self {
            database_url: optional("DATABASE_URL"),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 3000)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_format,
            commit_max_attempts,
            commit_timeout: Duration::from_millis(parse_or("COMMIT_TIMEOUT_MS", 2000)?),
            stress_horizon_months,
            seed_accounts_path: optional("SEED_ACCOUNTS_PATH"),
            forecasts_path: optional("FORECASTS_PATH"),
            flex_reset_check_interval: Duration::from_secs(parse_or("FLEX_RESET_CHECK_SECS", 3600)?),
        };

        config.check_environment()?;
        Ok(config)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Production never falls back to the in-memory store
    fn check_environment(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }
        Ok(())
    }
}

/// Read an optional variable, treating an empty value as unset
fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default() {
        let value: u32 = parse_or("FLEX_MORTGAGE_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_or_invalid() {
        env::set_var("FLEX_MORTGAGE_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16, _> = parse_or("FLEX_MORTGAGE_TEST_BAD_PORT", 3000);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("FLEX_MORTGAGE_TEST_BAD_PORT"))
        ));
    }

    fn config_for(environment: &str, database_url: Option<&str>) -> Config {
        Config {
            database_url: database_url.map(str::to_string),
            database_max_connections: 10,
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: environment.to_string(),
            log_format: LogFormat::Text,
            commit_max_attempts: 3,
            commit_timeout: Duration::from_millis(2000),
            stress_horizon_months: 3,
            seed_accounts_path: None,
            forecasts_path: None,
            flex_reset_check_interval: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_production_requires_database() {
        let config = config_for("production", None);
        assert!(config.is_production());
        assert!(matches!(
            config.check_environment(),
            Err(ConfigError::MissingEnv("DATABASE_URL"))
        ));

        assert!(config_for("production", Some("postgres://localhost/flex"))
            .check_environment()
            .is_ok());
        assert!(config_for("development", None).check_environment().is_ok());
    }

    #[test]
    fn test_optional_ignores_blank() {
        env::set_var("FLEX_MORTGAGE_TEST_BLANK", "  ");
        assert_eq!(optional("FLEX_MORTGAGE_TEST_BLANK"), None);
    }
}
