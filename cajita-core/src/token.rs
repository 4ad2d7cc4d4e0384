//! Bearer token state.
//!
//! This module provides:
//! - [`Token`] - The current bearer credential with its grant type and expiry
//! - [`TokenType`] - Which grant produced the token
//! - [`TokenStatus`] - Side-effect free snapshot for observability
//! - [`TokenStore`] - Holds zero or one token, optionally mirrored into a
//!   [`SecretStore`] so a session survives restarts

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::store::{Secret, SecretStore, StoreError};

/// Default safety margin subtracted from a token's expiry, in seconds.
pub const DEFAULT_SKEW_SECONDS: i64 = 30;

/// Secret-store key under which the session token is persisted.
pub const TOKEN_STORAGE_KEY: &str = "cajita/session/token";

/// The grant that produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Resource-owner password grant (end-user login).
    Password,
    /// Client-credentials grant (no end user).
    ClientCredentials,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Password => "password",
            TokenType::ClientCredentials => "client_credentials",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bearer token with its grant type and absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// The opaque bearer credential.
    pub value: Secret,

    /// Which grant produced this token.
    pub token_type: TokenType,

    /// When the server considers this token expired.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token that expires `ttl_seconds` from now.
    ///
    /// Lifetimes past the representable range saturate at
    /// [`DateTime::<Utc>::MAX_UTC`]; negative ones yield an expired token.
    pub fn new(value: impl Into<String>, token_type: TokenType, ttl_seconds: i64) -> Self {
        Self {
            value: Secret::new(value),
            token_type,
            expires_at: expiry_after(Utc::now(), ttl_seconds),
        }
    }

    /// Override the expiry with an absolute timestamp.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Whether the token is past its expiry, ignoring any skew.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Whether the token is still usable once `skew` is subtracted from its expiry.
    pub fn is_usable(&self, skew: Duration) -> bool {
        self.expires_at
            .checked_sub_signed(skew)
            .is_some_and(|deadline| Utc::now() < deadline)
    }

    /// Remaining lifetime, clamped at zero.
    pub fn expires_in(&self) -> Duration {
        (self.expires_at - Utc::now()).max(Duration::zero())
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.value.expose())
    }
}

/// `now + ttl_seconds`, saturating instead of overflowing.
fn expiry_after(now: DateTime<Utc>, ttl_seconds: i64) -> DateTime<Utc> {
    Duration::try_seconds(ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(if ttl_seconds < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Snapshot of the token store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatus {
    /// A token is stored and has not yet expired.
    pub authenticated: bool,

    /// Grant type of the stored token, if any.
    pub token_type: Option<TokenType>,

    /// Milliseconds until expiry, `None` when no token is stored.
    pub expires_in_ms: Option<i64>,
}

/// Holds the current bearer token.
///
/// Shared by every in-flight call through an `Arc`. Reads and writes are
/// short critical sections; the lock is never held across an `.await`.
pub struct TokenStore {
    slot: RwLock<Option<Token>>,
    backend: Option<Arc<dyn SecretStore>>,
}

impl TokenStore {
    /// Create an empty, memory-only token store.
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            backend: None,
        }
    }

    /// Create an empty token store that mirrors its token into `backend`.
    pub fn with_backend(backend: Arc<dyn SecretStore>) -> Self {
        Self {
            slot: RwLock::new(None),
            backend: Some(backend),
        }
    }

    /// Store a token that expires `ttl_seconds` from now and return a copy.
    pub fn set(&self, value: impl Into<String>, token_type: TokenType, ttl_seconds: i64) -> Token {
        let token = Token::new(value, token_type, ttl_seconds);
        self.set_token(token.clone());
        token
    }

    /// Store a fully built token, replacing any current one.
    pub fn set_token(&self, token: Token) {
        *self.slot.write() = Some(token);
    }

    /// Copy of the current token, valid or not.
    pub fn current(&self) -> Option<Token> {
        self.slot.read().clone()
    }

    /// Current token if it is still usable with the given skew.
    pub fn valid_token(&self, skew_seconds: i64) -> Option<Token> {
        let skew = Duration::try_seconds(skew_seconds).unwrap_or(Duration::MAX);
        self.slot
            .read()
            .as_ref()
            .filter(|t| t.is_usable(skew))
            .cloned()
    }

    /// True iff a token is stored and `now < expires_at - skew`.
    pub fn is_valid(&self, skew_seconds: i64) -> bool {
        self.valid_token(skew_seconds).is_some()
    }

    /// Remove the stored token unconditionally.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    pub fn status(&self) -> TokenStatus {
        match self.slot.read().as_ref() {
            Some(token) => TokenStatus {
                authenticated: !token.is_expired(),
                token_type: Some(token.token_type),
                expires_in_ms: Some(token.expires_in().num_milliseconds()),
            },
            None => TokenStatus {
                authenticated: false,
                token_type: None,
                expires_in_ms: None,
            },
        }
    }

    /// Whether a persistence backend is attached.
    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    /// Write the current token to the backend, or delete it when empty.
    ///
    /// No-op for memory-only stores.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        match self.current() {
            Some(token) => {
                let encoded = serde_json::to_string(&token)?;
                backend.set(TOKEN_STORAGE_KEY, &Secret::new(encoded)).await?;
                tracing::debug!("Persisted {} token", token.token_type);
            }
            None => {
                backend.delete(TOKEN_STORAGE_KEY).await?;
                tracing::debug!("Removed persisted token");
            }
        }
        Ok(())
    }

    /// Load a persisted token if one exists and has not expired.
    ///
    /// Returns `true` when a token was restored.
    pub async fn restore(&self) -> Result<bool, StoreError> {
        let Some(backend) = &self.backend else {
            return Ok(false);
        };

        let Some(stored) = backend.get(TOKEN_STORAGE_KEY).await? else {
            return Ok(false);
        };

        let token: Token = serde_json::from_str(stored.expose())?;
        if token.is_expired() {
            tracing::debug!("Discarding expired persisted token");
            backend.delete(TOKEN_STORAGE_KEY).await?;
            return Ok(false);
        }

        tracing::debug!("Restored {} token", token.token_type);
        self.set_token(token);
        Ok(true)
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("status", &self.status())
            .field("persistent", &self.is_persistent())
            .finish()
    }
}
