//! OAuth2 client-credentials grant directly against the identity provider.
//!
//! Used when the backend's own token endpoints are unavailable. The `oauth2`
//! crate builds and parses the exchange; the request itself goes out on the
//! shared `reqwest::Client`, so the configured timeout applies.

use async_trait::async_trait;
use oauth2::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, TokenResponse, TokenUrl,
    basic::BasicClient,
};
use thiserror::Error;

use super::{AuthResult, AuthStrategy, DEFAULT_EXPIRES_IN_SECS, TokenGrant};
use crate::store::Secret;
use crate::token::TokenType;

/// Client-credentials exchange with an `audience` parameter (Auth0 style).
pub struct IdentityProviderClientCredentials {
    token_url: String,
    client_id: String,
    client_secret: Secret,
    audience: Option<String>,
}

impl IdentityProviderClientCredentials {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Secret,
        audience: Option<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            audience,
        }
    }

    /// Auth0 tenant shorthand: `https://{domain}/oauth/token`.
    pub fn auth0(
        domain: &str,
        client_id: impl Into<String>,
        client_secret: Secret,
        audience: Option<String>,
    ) -> Self {
        Self::new(
            format!("https://{}/oauth/token", domain.trim_end_matches('/')),
            client_id,
            client_secret,
            audience,
        )
    }

    fn client(&self) -> Result<BasicClient, String> {
        let token_url =
            TokenUrl::new(self.token_url.clone()).map_err(|e| format!("invalid token URL: {}", e))?;
        // The authorize endpoint is never visited by this grant.
        let auth_url = AuthUrl::new(self.token_url.replace("/oauth/token", "/authorize"))
            .map_err(|e| format!("invalid authorize URL: {}", e))?;

        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.expose().to_string())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody))
    }
}

#[async_trait]
impl AuthStrategy for IdentityProviderClientCredentials {
    fn name(&self) -> &str {
        "identity_provider"
    }

    fn token_type(&self) -> TokenType {
        TokenType::ClientCredentials
    }

    async fn attempt(&self, http: &reqwest::Client) -> AuthResult {
        let client = match self.client() {
            Ok(client) => client,
            Err(reason) => return AuthResult::rejected(reason),
        };

        let mut request = client.exchange_client_credentials();
        if let Some(audience) = &self.audience {
            request = request.add_extra_param("audience", audience.as_str());
        }

        match request
            .request_async(|req| send_exchange(http.clone(), req))
            .await
        {
            Ok(response) => AuthResult::Granted(TokenGrant {
                access_token: Secret::new(response.access_token().secret().as_str()),
                expires_in: response
                    .expires_in()
                    .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
                    .unwrap_or(DEFAULT_EXPIRES_IN_SECS),
                token_type: Some(format!("{:?}", response.token_type())),
            }),
            Err(e) => AuthResult::rejected(format!("identity provider exchange failed: {}", e)),
        }
    }
}

/// Transport failure while talking to the token endpoint.
#[derive(Debug, Error)]
enum ExchangeError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Protocol(String),
}

/// Send an `oauth2` request over `http`.
///
/// `oauth2` speaks `http` 0.2 types while `reqwest` speaks `http` 1, so
/// method, headers and status are copied across by their wire form.
async fn send_exchange(
    http: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, ExchangeError> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| ExchangeError::Protocol(e.to_string()))?;

    let mut builder = http.request(method, request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    let response = builder.body(request.body).send().await?;

    let status_code = StatusCode::from_u16(response.status().as_u16())
        .map_err(|e| ExchangeError::Protocol(e.to_string()))?;
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(name, value);
        }
    }
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[test]
    fn test_auth0_token_url() {
        let strategy = IdentityProviderClientCredentials::auth0(
            "tenant.us.auth0.com/",
            "id",
            Secret::new("secret"),
            None,
        );
        assert_eq!(strategy.token_url, "https://tenant.us.auth0.com/oauth/token");
        assert!(strategy.client().is_ok());
    }

    #[test]
    fn test_invalid_token_url_is_rejected() {
        let strategy =
            IdentityProviderClientCredentials::new("not a url", "id", Secret::new("s"), None);
        assert!(strategy.client().is_err());
    }

    #[tokio::test]
    async fn test_exchange_honours_shared_client_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "late", "token_type": "Bearer"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let strategy = IdentityProviderClientCredentials::new(
            format!("{}/oauth/token", server.uri()),
            "id",
            Secret::new("s"),
            None,
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let started = std::time::Instant::now();
        let result = strategy.attempt(&http).await;

        assert!(matches!(result, AuthResult::Rejected { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_oversized_expires_in_is_clamped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "IDP",
                "token_type": "Bearer",
                "expires_in": u64::MAX
            })))
            .mount(&server)
            .await;

        let strategy = IdentityProviderClientCredentials::new(
            format!("{}/oauth/token", server.uri()),
            "id",
            Secret::new("s"),
            None,
        );

        match strategy.attempt(&reqwest::Client::new()).await {
            AuthResult::Granted(grant) => {
                assert_eq!(grant.access_token.expose(), "IDP");
                assert!(grant.expires_in > 0);
            }
            AuthResult::Rejected { reason } => panic!("rejected: {}", reason),
        }
    }
}
