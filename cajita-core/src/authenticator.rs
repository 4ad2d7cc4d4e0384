//! Cascading authentication.
//!
//! [`Authenticator::ensure`] returns the stored token while it is usable and
//! otherwise walks the configured strategies in order until one grants a
//! token. The token store is only written on success.
//!
//! Concurrent callers that all find the store empty will, by default, each
//! authenticate; the last success wins. With single-flight enabled they queue
//! behind one attempt and reuse its token.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::auth::{AuthResult, AuthStrategy};
use crate::token::{DEFAULT_SKEW_SECONDS, Token, TokenStore};

/// Error type for authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Every configured strategy was tried and none produced a token.
    #[error("authentication exhausted: {attempted} strategies failed")]
    Exhausted { attempted: usize },
}

/// Produces a valid token from an ordered list of strategies.
pub struct Authenticator {
    store: Arc<TokenStore>,
    strategies: Vec<Box<dyn AuthStrategy>>,
    http: reqwest::Client,
    skew_seconds: i64,
    flight: Option<Mutex<()>>,
}

impl Authenticator {
    /// Create an authenticator with the default 30 second skew.
    pub fn new(
        store: Arc<TokenStore>,
        strategies: Vec<Box<dyn AuthStrategy>>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            store,
            strategies,
            http,
            skew_seconds: DEFAULT_SKEW_SECONDS,
            flight: None,
        }
    }

    /// Use a custom expiry skew.
    pub fn with_skew(mut self, skew_seconds: i64) -> Self {
        self.skew_seconds = skew_seconds;
        self
    }

    /// Share one in-flight authentication among concurrent callers.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.flight = enabled.then(|| Mutex::new(()));
        self
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn skew_seconds(&self) -> i64 {
        self.skew_seconds
    }

    /// Names of the configured strategies, in priority order.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Return a usable token, authenticating if necessary.
    pub async fn ensure(&self) -> Result<Token, AuthError> {
        if let Some(token) = self.store.valid_token(self.skew_seconds) {
            tracing::debug!("Using cached {} token", token.token_type);
            return Ok(token);
        }

        match &self.flight {
            Some(lock) => {
                let _guard = lock.lock().await;
                // Another caller may have authenticated while we waited.
                if let Some(token) = self.store.valid_token(self.skew_seconds) {
                    return Ok(token);
                }
                self.run_strategies().await
            }
            None => self.run_strategies().await,
        }
    }

    /// Drop the current token, including any persisted copy.
    pub async fn invalidate(&self) {
        self.store.clear();
        if let Err(e) = self.store.persist().await {
            tracing::warn!("Failed to remove persisted token: {}", e);
        }
    }

    async fn run_strategies(&self) -> Result<Token, AuthError> {
        tracing::debug!(
            strategies = self.strategies.len(),
            "Starting cascading authentication"
        );

        for strategy in &self.strategies {
            match strategy.attempt(&self.http).await {
                AuthResult::Granted(grant) => {
                    let token = self.store.set(
                        grant.access_token.expose(),
                        strategy.token_type(),
                        grant.expires_in,
                    );
                    tracing::info!(
                        strategy = strategy.name(),
                        expires_at = %token.expires_at,
                        "Authenticated"
                    );
                    if let Err(e) = self.store.persist().await {
                        tracing::warn!("Failed to persist token: {}", e);
                    }
                    return Ok(token);
                }
                AuthResult::Rejected { reason } => {
                    tracing::warn!(strategy = strategy.name(), %reason, "Authentication strategy failed");
                }
            }
        }

        tracing::error!("All authentication strategies failed");
        Err(AuthError::Exhausted {
            attempted: self.strategies.len(),
        })
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("strategies", &self.strategy_names())
            .field("skew_seconds", &self.skew_seconds)
            .field("single_flight", &self.flight.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenGrant;
    use crate::store::Secret;
    use crate::token::TokenType;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Strategy double that counts attempts and grants or rejects on demand.
    struct Scripted {
        name: &'static str,
        grant: Option<&'static str>,
        token_type: TokenType,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn granting(name: &'static str, value: &'static str) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    grant: Some(value),
                    token_type: TokenType::Password,
                    delay: Duration::ZERO,
                    calls: calls.clone(),
                },
                calls,
            )
        }

        fn rejecting(name: &'static str) -> (Self, Arc<AtomicUsize>) {
            let (mut s, calls) = Self::granting(name, "");
            s.grant = None;
            (s, calls)
        }
    }

    #[async_trait]
    impl AuthStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn token_type(&self) -> TokenType {
            self.token_type
        }

        async fn attempt(&self, _http: &reqwest::Client) -> AuthResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.grant {
                Some(value) => AuthResult::Granted(TokenGrant {
                    access_token: Secret::new(value),
                    expires_in: 3600,
                    token_type: Some("Bearer".into()),
                }),
                None => AuthResult::rejected("scripted rejection"),
            }
        }
    }

    fn authenticator(strategies: Vec<Box<dyn AuthStrategy>>) -> Authenticator {
        Authenticator::new(Arc::new(TokenStore::new()), strategies, reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_valid_token_skips_strategies() {
        let (strategy, calls) = Scripted::granting("s", "fresh");
        let auth = authenticator(vec![Box::new(strategy)]);
        auth.store().set("cached", TokenType::Password, 3600);

        let token = auth.ensure().await.unwrap();
        assert_eq!(token.value.expose(), "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_granting_strategy_wins() {
        let (first, first_calls) = Scripted::rejecting("first");
        let (mut second, second_calls) = Scripted::granting("second", "T2");
        second.token_type = TokenType::ClientCredentials;
        let (third, third_calls) = Scripted::granting("third", "T3");

        let auth = authenticator(vec![Box::new(first), Box::new(second), Box::new(third)]);
        let token = auth.ensure().await.unwrap();

        assert_eq!(token.value.expose(), "T2");
        assert_eq!(token.token_type, TokenType::ClientCredentials);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            auth.store().status().token_type,
            Some(TokenType::ClientCredentials)
        );
    }

    #[tokio::test]
    async fn test_exhausted_leaves_store_untouched() {
        let (a, _) = Scripted::rejecting("a");
        let (b, _) = Scripted::rejecting("b");
        let auth = authenticator(vec![Box::new(a), Box::new(b)]);

        let result = auth.ensure().await;
        assert!(matches!(result, Err(AuthError::Exhausted { attempted: 2 })));
        assert!(auth.store().current().is_none());
    }

    #[tokio::test]
    async fn test_empty_strategy_list_is_exhausted() {
        let auth = authenticator(vec![]);
        assert!(matches!(
            auth.ensure().await,
            Err(AuthError::Exhausted { attempted: 0 })
        ));
    }

    #[tokio::test]
    async fn test_invalidate_restarts_from_first_strategy() {
        let (first, first_calls) = Scripted::granting("first", "T1");
        let auth = authenticator(vec![Box::new(first)]);

        auth.ensure().await.unwrap();
        auth.invalidate().await;
        assert!(!auth.store().is_valid(DEFAULT_SKEW_SECONDS));

        auth.ensure().await.unwrap();
        assert_eq!(first_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_flight_shares_one_attempt() {
        let (mut strategy, calls) = Scripted::granting("slow", "shared");
        strategy.delay = Duration::from_millis(50);
        let auth = Arc::new(authenticator(vec![Box::new(strategy)]).with_single_flight(true));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let auth = auth.clone();
                tokio::spawn(async move { auth.ensure().await })
            })
            .collect();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.value.expose(), "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
