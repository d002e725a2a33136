//! Machine-to-machine access token cache with single-flight refresh.
//!
//! - Fast path: a shared read lock; callers holding a fresh token never wait
//!   on each other and never touch the network.
//! - Slow path: callers join the current refresh flight (one `OnceCell` per
//!   flight). Exactly one exchange runs; every waiter gets a clone of its result.
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use url::Url;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECONDS: u64 = 300;

/// Outbound token acquisition failed.
///
/// `Clone` so a single failed refresh can be handed to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    #[error("token endpoint returned status {0}")]
    Status(u16),
    #[error("malformed token response: {0}")]
    Malformed(String),
    #[error("client credentials are not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: u64,
}

#[async_trait]
pub trait TokenExchange: Send + Sync + 'static {
    async fn exchange(&self) -> Result<IssuedToken, CredentialError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn from_issued(issued: IssuedToken, now: DateTime<Utc>) -> Self {
        let lifetime = i64::try_from(issued.expires_in).unwrap_or(i64::MAX);
        Self {
            access_token: issued.access_token,
            expires_at: now + chrono::Duration::seconds(lifetime.min(i64::from(i32::MAX))),
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        now + margin < self.expires_at
    }

    fn is_unexpired(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

type FlightResult = Result<CachedToken, CredentialError>;
type FlightCell = Arc<OnceCell<FlightResult>>;

/// The refresh currently in progress and how many callers are waiting on it.
struct Flight {
    cell: FlightCell,
    waiters: usize,
}

/// A caller's membership in a flight; leaving happens on drop, so a
/// cancelled caller still leaves.
struct FlightTicket<'a> {
    cache: &'a CredentialCache,
    cell: FlightCell,
}

impl Drop for FlightTicket<'_> {
    fn drop(&mut self) {
        self.cache.leave_flight(&self.cell);
    }
}

pub struct CredentialCache {
    exchange: Arc<dyn TokenExchange>,
    margin: chrono::Duration,
    cached: RwLock<Option<CachedToken>>,
    // Never held across an await.
    inflight: Mutex<Option<Flight>>,
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the token
        f.debug_struct("CredentialCache")
            .field("margin", &self.margin)
            .finish()
    }
}

impl CredentialCache {
    pub fn new(exchange: Arc<dyn TokenExchange>, margin: Duration) -> Self {
        Self {
            exchange,
            margin: chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero()),
            cached: RwLock::new(None),
            inflight: Mutex::new(None),
        }
    }

    /// Return a usable access token, refreshing it when it is absent or inside
    /// the expiry margin.
    pub async fn get_token(&self) -> Result<String, CredentialError> {
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        let ticket = self.join_flight();
        let result = ticket.cell.get_or_init(|| self.refresh()).await.clone();
        drop(ticket);

        match result {
            Ok(token) => Ok(token.access_token),
            Err(err) => {
                // Still before the hard expiry: better than failing the outbound call.
                let stale = self.cached.read().await.clone();
                match stale {
                    Some(token) if token.is_unexpired(Utc::now()) => {
                        tracing::warn!(error = %err, expires_at = %token.expires_at, "credential refresh failed; serving cached token");
                        Ok(token.access_token)
                    }
                    _ => Err(err),
                }
            }
        }
    }

    /// Drop the cached token so the next caller refreshes.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
        tracing::debug!("cached credential invalidated");
    }

    async fn fresh_token(&self) -> Option<String> {
        let guard = self.cached.read().await;
        guard
            .as_ref()
            .filter(|t| t.is_fresh(Utc::now(), self.margin))
            .map(|t| t.access_token.clone())
    }

    fn join_flight(&self) -> FlightTicket<'_> {
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        let flight = slot.get_or_insert_with(|| Flight {
            cell: Arc::new(OnceCell::new()),
            waiters: 0,
        });
        flight.waiters += 1;
        FlightTicket {
            cache: self,
            cell: flight.cell.clone(),
        }
    }

    /// A successful flight retires as soon as anyone leaves it (the token is
    /// cached by then). A failed or abandoned flight stays joinable until its
    /// last waiter leaves, so callers that arrive while it is still being
    /// drained share its error instead of starting another exchange.
    fn leave_flight(&self, cell: &FlightCell) {
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(flight) = slot.as_mut().filter(|f| Arc::ptr_eq(&f.cell, cell)) else {
            return;
        };
        flight.waiters = flight.waiters.saturating_sub(1);
        let succeeded = matches!(flight.cell.get(), Some(Ok(_)));
        if succeeded || flight.waiters == 0 {
            *slot = None;
        }
    }

    /// Runs once per flight.
    async fn refresh(&self) -> FlightResult {
        // A previous flight may have finished between our fast-path miss and
        // joining this one.
        {
            let guard = self.cached.read().await;
            if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(Utc::now(), self.margin)) {
                return Ok(token.clone());
            }
        }

        tracing::debug!("refreshing client credentials");
        let issued = self.exchange.exchange().await.inspect_err(|err| {
            tracing::error!(error = %err, "client credentials exchange failed");
        })?;

        let token = CachedToken::from_issued(issued, Utc::now());
        *self.cached.write().await = Some(token.clone());
        tracing::debug!(expires_at = %token.expires_at, "client credentials refreshed");

        Ok(token)
    }
}

/// Client-credentials grant settings.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    pub token_uri: Url,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "expiresIn")]
    expires_in: Option<u64>,
}

/// OAuth2 client-credentials exchange over HTTP.
#[derive(Clone)]
pub struct ClientCredentialsExchange {
    client: reqwest::Client,
    credentials: ClientCredentials,
}

impl std::fmt::Debug for ClientCredentialsExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the client secret
        f.debug_struct("ClientCredentialsExchange")
            .field("token_uri", &self.credentials.token_uri.as_str())
            .field("client_id", &self.credentials.client_id)
            .field("scopes", &self.credentials.scopes)
            .finish()
    }
}

impl ClientCredentialsExchange {
    pub fn new(credentials: ClientCredentials, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl TokenExchange for ClientCredentialsExchange {
    async fn exchange(&self) -> Result<IssuedToken, CredentialError> {
        let scope = self.credentials.scopes.join(" ");
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        let res = self
            .client
            .post(self.credentials.token_uri.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(CredentialError::Status(status.as_u16()));
        }

        let body: TokenEndpointResponse = res
            .json()
            .await
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;

        if body.access_token.trim().is_empty() {
            return Err(CredentialError::Malformed("empty access token".into()));
        }

        Ok(IssuedToken {
            access_token: body.access_token,
            expires_in: body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS),
        })
    }
}

/// Used when no client credentials are configured: every call fails, so no
/// outbound call is ever sent without credentials.
#[derive(Clone, Debug, Default)]
pub struct UnconfiguredExchange;

#[async_trait]
impl TokenExchange for UnconfiguredExchange {
    async fn exchange(&self) -> Result<IssuedToken, CredentialError> {
        Err(CredentialError::NotConfigured)
    }
}
