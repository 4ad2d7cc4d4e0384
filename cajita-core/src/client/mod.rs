//! Authenticated request executor.
//!
//! [`ApiClient::execute`] attaches a bearer token to each call, answers a 401
//! by re-authenticating and retrying once, and resolves everything (including
//! transport failures) to a [`RequestOutcome`]. Failed outcomes are handed to
//! the [`ErrorReporter`].

pub mod outcome;
pub mod request;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::authenticator::{AuthError, Authenticator};
use crate::config::{ClientConfig, join_url};
use crate::error::CajitaError;
use crate::reporter::{CallContext, ErrorReporter, NotificationSink};
use crate::store::{StoreError, create_store};
use crate::token::{Token, TokenStatus, TokenStore};

pub use outcome::{ApiError, FailureKind, RequestOutcome, extract_message};
pub use request::{ApiRequest, MultipartField, MultipartValue, RequestBody, ResponseFormat};

/// Per-call lifecycle. `Retrying` is entered at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Authenticating,
    Requesting,
    Retrying,
    Completed,
    Failed,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::Authenticating => "authenticating",
            CallState::Requesting => "requesting",
            CallState::Retrying => "retrying",
            CallState::Completed => "completed",
            CallState::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct Lifecycle {
    state: CallState,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: CallState::Idle,
        }
    }

    fn advance(&mut self, next: CallState) {
        tracing::debug!(from = %self.state, to = %next, "Call state");
        self.state = next;
    }

    fn finish(&mut self, outcome: &RequestOutcome) {
        self.advance(if outcome.is_failure() {
            CallState::Failed
        } else {
            CallState::Completed
        });
    }
}

/// Authenticated client for the backend API.
///
/// Cheap to clone; clones share the token store and authenticator.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<Authenticator>,
    reporter: ErrorReporter,
}

impl ApiClient {
    /// Assemble a client from parts. `http` should be the client the
    /// authenticator uses.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        auth: Arc<Authenticator>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            auth,
            reporter,
        }
    }

    /// Build a client, its token store and authenticator from configuration.
    pub fn from_config(
        config: &ClientConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, CajitaError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let store = if config.persist_token {
            TokenStore::with_backend(Arc::from(create_store(true)))
        } else {
            TokenStore::new()
        };

        let auth = Authenticator::new(Arc::new(store), config.build_strategies(), http.clone())
            .with_skew(config.skew_seconds)
            .with_single_flight(config.single_flight);

        let reporter = ErrorReporter::new(sink)
            .with_duration(Duration::from_millis(config.notification_duration_ms));

        tracing::debug!(
            base_url = config.base_url(),
            strategies = ?auth.strategy_names(),
            "Created API client"
        );

        Ok(Self::new(http, config.base_url(), Arc::new(auth), reporter))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        self.auth.store()
    }

    /// Execute an authenticated call.
    pub async fn execute(&self, request: ApiRequest) -> RequestOutcome {
        let call_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "api_call",
            %call_id,
            method = %request.method,
            endpoint = %request.endpoint
        );

        let outcome = self.run(&request).instrument(span).await;
        self.report(call_id, &request, &outcome);
        outcome
    }

    /// Execute a call without a token and without the 401 retry.
    pub async fn execute_public(&self, request: ApiRequest) -> RequestOutcome {
        let call_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "api_call",
            %call_id,
            method = %request.method,
            endpoint = %request.endpoint,
            public = true
        );

        let outcome = async {
            let mut lifecycle = Lifecycle::new();
            lifecycle.advance(CallState::Requesting);
            let outcome = match self.send(&request, None).await {
                Ok(response) => read_outcome(response, request.expect, 1).await,
                Err(e) => RequestOutcome::network(e.to_string(), 1),
            };
            lifecycle.finish(&outcome);
            outcome
        }
        .instrument(span)
        .await;

        self.report(call_id, &request, &outcome);
        outcome
    }

    async fn run(&self, request: &ApiRequest) -> RequestOutcome {
        let mut lifecycle = Lifecycle::new();

        lifecycle.advance(CallState::Authenticating);
        let token = match self.auth.ensure().await {
            Ok(token) => token,
            Err(e) => {
                let outcome = RequestOutcome::unauthenticated(e.to_string());
                lifecycle.finish(&outcome);
                return outcome;
            }
        };

        lifecycle.advance(CallState::Requesting);
        let response = match self.send(request, Some(&token)).await {
            Ok(response) => response,
            Err(e) => {
                let outcome = RequestOutcome::network(e.to_string(), 1);
                lifecycle.finish(&outcome);
                return outcome;
            }
        };

        if response.status() != StatusCode::UNAUTHORIZED {
            let outcome = read_outcome(response, request.expect, 1).await;
            lifecycle.finish(&outcome);
            return outcome;
        }

        tracing::debug!("Received 401, re-authenticating");
        lifecycle.advance(CallState::Retrying);
        self.auth.invalidate().await;

        let fresh = match self.auth.ensure().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Re-authentication failed: {}", e);
                let outcome = read_outcome(response, request.expect, 1).await;
                lifecycle.finish(&outcome);
                return outcome;
            }
        };

        lifecycle.advance(CallState::Requesting);
        let outcome = match self.send(request, Some(&fresh)).await {
            Ok(retried) => read_outcome(retried, request.expect, 2).await,
            Err(e) => RequestOutcome::network(e.to_string(), 2),
        };
        lifecycle.finish(&outcome);
        outcome
    }

    async fn send(
        &self,
        request: &ApiRequest,
        token: Option<&Token>,
    ) -> reqwest::Result<reqwest::Response> {
        let url = join_url(&self.base_url, &request.endpoint);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if request.sends_json() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(token) = token {
            match HeaderValue::from_str(&token.authorization_header()) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Token is not a valid header value; sending without it"),
            }
        }
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(headers);

        builder = match &request.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            Some(RequestBody::Multipart(fields)) => {
                builder.multipart(request::multipart_form(fields)?)
            }
        };

        builder.send().await
    }

    fn report(&self, call_id: Uuid, request: &ApiRequest, outcome: &RequestOutcome) {
        self.reporter.report(
            CallContext {
                call_id,
                method: &request.method,
                endpoint: &request.endpoint,
            },
            outcome,
        );
    }

    pub async fn get(&self, endpoint: &str) -> RequestOutcome {
        self.execute(ApiRequest::get(endpoint)).await
    }

    pub async fn post_json(&self, endpoint: &str, body: Value) -> RequestOutcome {
        self.execute(ApiRequest::post(endpoint).with_json(body)).await
    }

    pub async fn put_json(&self, endpoint: &str, body: Value) -> RequestOutcome {
        self.execute(ApiRequest::put(endpoint).with_json(body)).await
    }

    pub async fn patch_json(&self, endpoint: &str, body: Value) -> RequestOutcome {
        self.execute(ApiRequest::patch(endpoint).with_json(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> RequestOutcome {
        self.execute(ApiRequest::delete(endpoint)).await
    }

    /// Authenticate now (or reuse a valid token) and report the result.
    pub async fn login(&self) -> Result<TokenStatus, AuthError> {
        self.auth.ensure().await?;
        Ok(self.token_status())
    }

    /// Drop the current token, including any persisted copy.
    pub async fn logout(&self) {
        self.auth.invalidate().await;
    }

    pub fn token_status(&self) -> TokenStatus {
        self.auth.store().status()
    }

    /// Load a persisted token into the store, if one exists.
    pub async fn restore_session(&self) -> Result<bool, StoreError> {
        self.auth.store().restore().await
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("reporter", &self.reporter)
            .finish()
    }
}

async fn read_outcome(
    response: reqwest::Response,
    expect: ResponseFormat,
    attempts: u8,
) -> RequestOutcome {
    let status = response.status();
    match response.text().await {
        Ok(text) => RequestOutcome::from_parts(status, text, expect, attempts),
        Err(e) => RequestOutcome::network(format!("failed to read response body: {}", e), attempts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NoopSink;

    #[test]
    fn test_call_state_display() {
        assert_eq!(CallState::Retrying.to_string(), "retrying");
        assert_eq!(CallState::Completed.to_string(), "completed");
    }

    #[test]
    fn test_from_config_rejects_invalid_base_url() {
        let config = ClientConfig::new("not a url");
        let result = ApiClient::from_config(&config, Arc::new(NoopSink));
        assert!(matches!(result, Err(CajitaError::Config(_))));
    }

    #[tokio::test]
    async fn test_unauthenticated_outcome_without_strategies() {
        let config = ClientConfig::new("http://127.0.0.1:9");
        let client = ApiClient::from_config(&config, Arc::new(NoopSink)).unwrap();

        let outcome = client.get("/videos").await;
        assert_eq!(outcome.status, 0);
        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(FailureKind::Unauthenticated));
        assert_eq!(outcome.attempts, 0);
    }
}
