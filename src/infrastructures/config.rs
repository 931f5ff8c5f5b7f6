//! Process configuration, read from the environment once at startup.

use std::collections::HashMap;
use thiserror::Error;

pub const ENV_PRIVATE_KEY_SECRET: &str = "AB_PRIVATE_KEY_SECRET_NAME";
pub const ENV_PRIVATE_KEY_FILE: &str = "AB_PRIVATE_KEY_FILE";
pub const ENV_GH_APP_ID: &str = "AB_GH_APP_ID";
pub const ENV_GITHUB_API_URL: &str = "AB_GITHUB_API_URL";
pub const ENV_BADGE_SERVICE_URL: &str = "AB_BADGE_SERVICE_URL";
pub const ENV_PORT: &str = "PORT";

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_BADGE_SERVICE_URL: &str = "https://badgen.net";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("either AB_PRIVATE_KEY_SECRET_NAME or AB_PRIVATE_KEY_FILE must be set")]
    MissingPrivateKey,
    #[error("AB_GH_APP_ID is not set")]
    MissingAppId,
    #[error("AB_GH_APP_ID must be an integer, got {value:?}")]
    InvalidAppId {
        value: String,
        source: std::num::ParseIntError,
    },
    #[error("PORT must be a port number, got {value:?}")]
    InvalidPort {
        value: String,
        source: std::num::ParseIntError,
    },
}

/// Where the GitHub App private key is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateKeySource {
    /// A Secret Manager secret version resource name.
    SecretManager(String),
    /// A local PEM file.
    File(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub private_key: PrivateKeySource,
    pub app_id: u64,
    pub github_api_url: String,
    pub badge_service_url: String,
    pub port: u16,
}

impl Config {
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Builds the configuration from a map of variables. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or malformed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let var = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let private_key = match (var(ENV_PRIVATE_KEY_FILE), var(ENV_PRIVATE_KEY_SECRET)) {
            (Some(path), _) => PrivateKeySource::File(path),
            (None, Some(name)) => PrivateKeySource::SecretManager(name),
            (None, None) => return Err(ConfigError::MissingPrivateKey),
        };

        let app_id = var(ENV_GH_APP_ID).ok_or(ConfigError::MissingAppId)?;
        let app_id = app_id
            .trim()
            .parse::<u64>()
            .map_err(|source| ConfigError::InvalidAppId {
                value: app_id.clone(),
                source,
            })?;

        let port = match var(ENV_PORT) {
            Some(value) => value
                .parse::<u16>()
                .map_err(|source| ConfigError::InvalidPort { value, source })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            private_key,
            app_id,
            github_api_url: var(ENV_GITHUB_API_URL)
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            badge_service_url: var(ENV_BADGE_SERVICE_URL)
                .unwrap_or_else(|| DEFAULT_BADGE_SERVICE_URL.to_string()),
            port,
        })
    }
}
