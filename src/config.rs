/*
 * Responsibility
 * - Read environment variables / .env (authority URL, client credentials, public paths...)
 * - Validate values (fail startup when something required is missing)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::services::auth::credentials::ClientCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub authority_validate_url: Url,
    pub authority_timeout: Duration,

    // None => outbound calls fail with CredentialError::NotConfigured
    pub client_credentials: Option<ClientCredentials>,
    pub credential_expiry_margin: Duration,

    // None => NoopUserDirectory
    pub user_service_url: Option<Url>,
    pub user_service_timeout: Duration,

    pub public_paths: Vec<String>,
    pub request_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the client secret
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("authority_validate_url", &self.authority_validate_url.as_str())
            .field("client_credentials", &self.client_credentials.is_some())
            .field("user_service_url", &self.user_service_url.as_ref().map(Url::as_str))
            .field("public_paths", &self.public_paths)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = get("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = get("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let authority_validate_url = get("AUTHORITY_VALIDATE_URL")
            .ok_or(ConfigError::Missing("AUTHORITY_VALIDATE_URL"))
            .and_then(|v| Url::parse(&v).map_err(|_| ConfigError::Invalid("AUTHORITY_VALIDATE_URL")))?;

        let authority_timeout = Duration::from_millis(
            get("AUTHORITY_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(3000),
        );

        let client_credentials = match get("OAUTH2_TOKEN_URI").filter(|v| !v.trim().is_empty()) {
            Some(uri) => {
                let token_uri =
                    Url::parse(&uri).map_err(|_| ConfigError::Invalid("OAUTH2_TOKEN_URI"))?;
                let client_id =
                    get("OAUTH2_CLIENT_ID").ok_or(ConfigError::Missing("OAUTH2_CLIENT_ID"))?;
                let client_secret = get("OAUTH2_CLIENT_SECRET")
                    .ok_or(ConfigError::Missing("OAUTH2_CLIENT_SECRET"))?;
                let scopes = split_list(
                    &get("OAUTH2_SCOPES").unwrap_or_else(|| "api.read,api.write".to_string()),
                );

                Some(ClientCredentials {
                    token_uri,
                    client_id,
                    client_secret,
                    scopes,
                })
            }
            None => None,
        };

        let credential_expiry_margin = Duration::from_secs(
            get("CREDENTIAL_EXPIRY_MARGIN_SECONDS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        );

        let user_service_url = match get("USER_SERVICE_URL").filter(|v| !v.trim().is_empty()) {
            Some(raw) => {
                // Directory-style base: endpoints are appended as path segments
                let raw = if raw.ends_with('/') { raw } else { format!("{raw}/") };
                Some(Url::parse(&raw).map_err(|_| ConfigError::Invalid("USER_SERVICE_URL"))?)
            }
            None => None,
        };

        let user_service_timeout = Duration::from_millis(
            get("USER_SERVICE_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(3000),
        );

        let public_paths = split_list(
            &get("PUBLIC_PATHS").unwrap_or_else(|| "/health,/ping,/actuator/".to_string()),
        );

        let request_timeout = Duration::from_secs(
            get("REQUEST_TIMEOUT_SECONDS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        );

        Ok(Self {
            addr,
            app_env,
            authority_validate_url,
            authority_timeout,
            client_credentials,
            credential_expiry_margin,
            user_service_url,
            user_service_timeout,
            public_paths,
            request_timeout,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
