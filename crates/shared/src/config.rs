use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{EnvLookup, http_url_env, process_env, require_env};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_GOOGLE_REDIRECT_URI: &str = "http://127.0.0.1:8765/callback";
pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

pub const GOOGLE_SIGN_IN_SCOPES: [&str; 4] = [
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/calendar",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
}

/// Loads `.env` from the working directory (or a parent) when one exists.
pub fn load_dotenv() -> Result<Option<PathBuf>, ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    pub(crate) fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let api_url = http_url_env(lookup, "AEGIS_API_URL", DEFAULT_API_URL)?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl AsRef<str>) -> Result<Self, ConfigError> {
        let api_url = api_url.as_ref().trim();
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigError::InvalidConfiguration(
                "api url must start with http:// or https://".to_string(),
            ));
        }
        self.api_url = api_url.trim_end_matches('/').to_string();
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
}

impl GoogleOAuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    pub(crate) fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: require_env(lookup, "GOOGLE_CLIENT_ID")?,
            client_secret: require_env(lookup, "GOOGLE_CLIENT_SECRET")?,
            redirect_uri: http_url_env(
                lookup,
                "GOOGLE_OAUTH_REDIRECT_URI",
                DEFAULT_GOOGLE_REDIRECT_URI,
            )?,
            auth_url: http_url_env(lookup, "GOOGLE_OAUTH_AUTH_URL", DEFAULT_GOOGLE_AUTH_URL)?,
            token_url: http_url_env(lookup, "GOOGLE_OAUTH_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL)?,
            userinfo_url: http_url_env(
                lookup,
                "GOOGLE_OAUTH_USERINFO_URL",
                DEFAULT_GOOGLE_USERINFO_URL,
            )?,
            scopes: GOOGLE_SIGN_IN_SCOPES
                .iter()
                .map(|scope| (*scope).to_string())
                .collect(),
        })
    }
}
