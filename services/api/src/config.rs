//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::Duration;
use std::net::SocketAddr;
use tracing::Level;

const MIN_SECRET_BYTES: usize = 32;
const DEFAULT_ORIGIN: &str = "https://coach-connect-ui.onrender.com";
const DEV_ORIGIN: &str = "http://localhost:5173";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub environment: Environment,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub impersonation_ttl: Duration,
    pub cors_origins: Vec<String>,
    pub allow_unset_password_login: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let database_max_connections = parse_number(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let environment = match lookup("APP_ENV").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "APP_ENV".to_string(),
                    format!("'{}' is neither production nor development", other),
                ))
            }
        };

        // --- Load Token Settings ---
        let jwt_secret =
            lookup("JWT_SECRET").ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {} bytes long", MIN_SECRET_BYTES),
            ));
        }
        let session_ttl = Duration::seconds(parse_number(
            &lookup,
            "SESSION_TTL_SECONDS",
            coach_connect_core::tokens::DEFAULT_SESSION_TTL_SECS,
        )?);
        let impersonation_ttl = Duration::seconds(parse_number(
            &lookup,
            "IMPERSONATION_TTL_SECONDS",
            coach_connect_core::tokens::DEFAULT_IMPERSONATION_TTL_SECS,
        )?);

        // --- Load HTTP Settings ---
        let mut cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| vec![DEFAULT_ORIGIN.to_string()]);
        if environment == Environment::Development && !cors_origins.iter().any(|o| o == DEV_ORIGIN) {
            cors_origins.push(DEV_ORIGIN.to_string());
        }

        let allow_unset_password_login = match lookup("ALLOW_UNSET_PASSWORD_LOGIN").as_deref() {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "ALLOW_UNSET_PASSWORD_LOGIN".to_string(),
                    format!("'{}' is not a boolean", other),
                ))
            }
        };

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            environment,
            jwt_secret,
            session_ttl,
            impersonation_ttl,
            cors_origins,
            allow_unset_password_login,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
