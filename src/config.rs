use std::env;

use crate::error::Error;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HSDB connection settings loaded from environment variables
#[derive(Debug, Clone)]
pub struct HsdbConfig {
    /// Base URL of the HSDB API
    pub base_url: String,
    /// Login username
    pub username: String,
    /// Login password
    pub password: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl HsdbConfig {
    /// Load HSDB settings from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            env::var("HSDB_BASE_URL").map_err(|_| ConfigError::MissingEnvVar("HSDB_BASE_URL"))?;

        let username =
            env::var("HSDB_USERNAME").map_err(|_| ConfigError::MissingEnvVar("HSDB_USERNAME"))?;

        let password =
            env::var("HSDB_PASSWORD").map_err(|_| ConfigError::MissingEnvVar("HSDB_PASSWORD"))?;

        Ok(Self {
            base_url,
            username,
            password,
            timeout_secs: timeout_from_env()?,
        })
    }
}

/// Orca connection settings loaded from environment variables
#[derive(Debug, Clone)]
pub struct OrcaConfig {
    /// Base URL of the Orca API
    pub base_url: String,
    /// Static API key sent with every request
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OrcaConfig {
    /// Load Orca settings from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("ORCA_API_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("ORCA_API_BASE_URL"))?;

        let api_key =
            env::var("ORCA_API_KEY").map_err(|_| ConfigError::MissingEnvVar("ORCA_API_KEY"))?;

        Ok(Self {
            base_url,
            api_key,
            timeout_secs: timeout_from_env()?,
        })
    }
}

fn timeout_from_env() -> Result<u64, ConfigError> {
    env::var("ORCA_SYNC_TIMEOUT_SECS")
        .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue("ORCA_SYNC_TIMEOUT_SECS"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
