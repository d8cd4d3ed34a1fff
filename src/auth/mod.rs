/// OAuth credential management
///
/// `CredentialManager` is the only writer of the stored token pair. Callers
/// ask it for an access token right before each remote request; an expired
/// token is refreshed on the spot, with at most one refresh exchange in
/// flight at a time.
pub mod callback;
pub mod endpoint;

use crate::error::{PlayerError, Result};
use crate::models::TokenState;
use crate::storage::{keys, KeyValueStore, Scope};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub use endpoint::SpotifyTokenEndpoint;

/// Scopes needed for library reads and playback control
pub const SPOTIFY_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "user-library-read",
    "user-modify-playback-state",
    "user-read-playback-state",
];

/// Result of a successful token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present on code exchanges; refresh exchanges may rotate it
    pub refresh_token: Option<String>,
    pub expires_in_secs: i64,
}

/// The token endpoint of the authorization server
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code for a token pair
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    /// Exchange a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub struct CredentialManager {
    store: Arc<dyn KeyValueStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    /// Held for the duration of a refresh exchange or a token write
    refresh_slot: Mutex<()>,
    /// Bumped on logout so a refresh that raced it throws its result away
    generation: AtomicU64,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn KeyValueStore>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self::with_clock(store, endpoint, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            endpoint,
            clock,
            refresh_slot: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Return an access token that is valid right now
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let token = self.load().await?.ok_or(PlayerError::AuthUnavailable)?;
        if !token.is_expired_at(self.clock.now_ms()) {
            return Ok(token.access_token);
        }

        let _slot = self.refresh_slot.lock().await;

        // Another caller may have refreshed (or logged out) while we waited
        let token = self.load().await?.ok_or(PlayerError::AuthUnavailable)?;
        if !token.is_expired_at(self.clock.now_ms()) {
            tracing::debug!("Access token was refreshed by a concurrent caller");
            return Ok(token.access_token);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        tracing::info!("Spotify access token expired, refreshing");

        let grant = match self.endpoint.refresh(&token.refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!("Token refresh failed, keeping stored credentials: {}", e);
                return Err(e);
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::info!("Logged out during token refresh, discarding new token");
            return Err(PlayerError::AuthUnavailable);
        }

        // Another process sharing the store may have logged out meanwhile
        let still_stored = self
            .load()
            .await?
            .map_or(false, |current| current.refresh_token == token.refresh_token);
        if !still_stored {
            tracing::info!("Stored credentials changed during token refresh, discarding new token");
            return Err(PlayerError::AuthUnavailable);
        }

        let refreshed = TokenState {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.unwrap_or(token.refresh_token),
            expires_at_ms: self.expires_at(grant.expires_in_secs),
        };
        self.save(&refreshed).await?;
        tracing::info!("Spotify access token refreshed");

        Ok(refreshed.access_token)
    }

    /// Whether a token pair is stored (it may still need a refresh)
    pub async fn is_logged_in(&self) -> bool {
        matches!(self.load().await, Ok(Some(_)))
    }

    /// Exchange the code from the interactive flow and store the new token pair
    pub async fn complete_authorization(&self, code: &str) -> Result<TokenState> {
        let grant = self
            .endpoint
            .exchange_code(code)
            .await
            .map_err(|e| match e {
                PlayerError::AuthDenied(_) => e,
                other => PlayerError::AuthDenied(other.to_string()),
            })?;

        let refresh_token = grant.refresh_token.ok_or_else(|| {
            PlayerError::AuthDenied("Token response did not include a refresh token".to_string())
        })?;

        let token = TokenState {
            access_token: grant.access_token,
            refresh_token,
            expires_at_ms: self.expires_at(grant.expires_in_secs),
        };

        let _slot = self.refresh_slot.lock().await;
        self.save(&token).await?;
        tracing::info!("Spotify authorization complete, token stored");
        Ok(token)
    }

    /// Drop the stored token pair. Wins over any refresh in flight.
    pub async fn logout(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _slot = self.refresh_slot.lock().await;
        self.store
            .remove(
                Scope::Local,
                &[keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::TOKEN_EXPIRES_AT],
            )
            .await?;
        tracing::info!("Logged out of Spotify");
        Ok(())
    }

    /// Currently stored token pair, if both tokens are present
    pub async fn load(&self) -> Result<Option<TokenState>> {
        let access = self.store.get(Scope::Local, keys::ACCESS_TOKEN).await?;
        let refresh = self.store.get(Scope::Local, keys::REFRESH_TOKEN).await?;
        let expires = self.store.get(Scope::Local, keys::TOKEN_EXPIRES_AT).await?;

        let (Some(access), Some(refresh)) = (
            access.as_ref().and_then(Value::as_str),
            refresh.as_ref().and_then(Value::as_str),
        ) else {
            return Ok(None);
        };

        Ok(Some(TokenState {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            // Unknown expiry forces a refresh on first use
            expires_at_ms: expires.as_ref().and_then(Value::as_i64).unwrap_or(0),
        }))
    }

    async fn save(&self, token: &TokenState) -> Result<()> {
        self.store
            .set_many(
                Scope::Local,
                vec![
                    (
                        keys::ACCESS_TOKEN.to_string(),
                        Value::String(token.access_token.clone()),
                    ),
                    (
                        keys::REFRESH_TOKEN.to_string(),
                        Value::String(token.refresh_token.clone()),
                    ),
                    (
                        keys::TOKEN_EXPIRES_AT.to_string(),
                        Value::from(token.expires_at_ms),
                    ),
                ],
            )
            .await
    }

    fn expires_at(&self, expires_in_secs: i64) -> i64 {
        self.clock.now_ms() + expires_in_secs * 1000
    }
}
