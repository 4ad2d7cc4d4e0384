//! Authentication strategies.
//!
//! Each strategy performs one network exchange and reports an [`AuthResult`].
//! The [`Authenticator`](crate::authenticator::Authenticator) tries them in
//! configured order and keeps the first granted token.
//!
//! - [`password`] - `POST /login?email=..&password=..` against the backend
//! - [`client_credentials`] - `POST /auth/client-credentials` against the backend
//! - [`identity_provider`] - OAuth2 client-credentials grant directly against
//!   the identity provider's token endpoint

pub mod client_credentials;
pub mod identity_provider;
pub mod password;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::store::Secret;
use crate::token::TokenType;

pub use client_credentials::BackendClientCredentials;
pub use identity_provider::IdentityProviderClientCredentials;
pub use password::{LoginCredentials, PasswordLogin};

/// Lifetime assumed when a token response omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Maximum length of a rejected response body kept in the rejection reason.
const MAX_REASON_BODY_LENGTH: usize = 200;

/// A token issued by a successful strategy attempt.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: Secret,

    /// Lifetime in seconds.
    pub expires_in: i64,

    /// Token type as reported by the server (usually "Bearer").
    pub token_type: Option<String>,
}

/// Outcome of one authentication attempt.
#[derive(Debug, Clone)]
pub enum AuthResult {
    Granted(TokenGrant),
    Rejected { reason: String },
}

impl AuthResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        AuthResult::Rejected {
            reason: reason.into(),
        }
    }
}

/// A way of obtaining a bearer token.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Grant type recorded on tokens this strategy produces.
    fn token_type(&self) -> TokenType;

    /// Perform the exchange. Never fails: transport and protocol problems
    /// become [`AuthResult::Rejected`].
    async fn attempt(&self, http: &reqwest::Client) -> AuthResult;
}

/// Token endpoint response body.
///
/// The backend names the credential either `access_token` or `token`.
/// `expires_in` is read leniently; see [`lifetime_secs`].
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<Value>,
}

impl TokenResponse {
    fn into_grant(self) -> Option<TokenGrant> {
        let value = self
            .access_token
            .or(self.token)
            .filter(|t| !t.is_empty())?;

        Some(TokenGrant {
            access_token: Secret::new(value),
            expires_in: lifetime_secs(self.expires_in.as_ref()),
            token_type: self.token_type,
        })
    }
}

/// Token lifetime from an `expires_in` value.
///
/// Accepts integers, floats and numeric strings. Out-of-range values
/// saturate; anything unreadable falls back to [`DEFAULT_EXPIRES_IN_SECS`].
fn lifetime_secs(value: Option<&Value>) -> i64 {
    let seconds = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().and_then(float_secs)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_secs))
        }
        _ => None,
    };
    seconds.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
}

fn float_secs(value: f64) -> Option<i64> {
    // `as` saturates at the i64 bounds.
    value.is_finite().then(|| value as i64)
}

/// Interpret a token endpoint response.
async fn read_grant(response: reqwest::Response) -> AuthResult {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return AuthResult::rejected(format!("{} - {}", status, truncate(&body)));
    }

    match response.json::<TokenResponse>().await {
        Ok(parsed) => match parsed.into_grant() {
            Some(grant) => AuthResult::Granted(grant),
            None => AuthResult::rejected("response carried no access token"),
        },
        Err(e) => AuthResult::rejected(format!("unreadable token response: {}", e)),
    }
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_REASON_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_REASON_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_prefers_access_token() {
        let parsed: TokenResponse = serde_json::from_str(
            r#"{"access_token": "a", "token": "b", "expires_in": 60, "token_type": "Bearer"}"#,
        )
        .unwrap();
        let grant = parsed.into_grant().unwrap();
        assert_eq!(grant.access_token.expose(), "a");
        assert_eq!(grant.expires_in, 60);
        assert_eq!(grant.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_token_response_accepts_token_field() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"token": "b"}"#).unwrap();
        let grant = parsed.into_grant().unwrap();
        assert_eq!(grant.access_token.expose(), "b");
        assert_eq!(grant.expires_in, DEFAULT_EXPIRES_IN_SECS);
    }

    #[test]
    fn test_token_response_without_token_is_not_a_grant() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token": ""}"#).unwrap();
        assert!(parsed.into_grant().is_none());
    }

    #[test]
    fn test_expires_in_accepts_float_and_string() {
        let float: TokenResponse =
            serde_json::from_str(r#"{"access_token": "a", "expires_in": 3600.0}"#).unwrap();
        assert_eq!(float.into_grant().unwrap().expires_in, 3600);

        let string: TokenResponse =
            serde_json::from_str(r#"{"access_token": "a", "expires_in": " 1800 "}"#).unwrap();
        assert_eq!(string.into_grant().unwrap().expires_in, 1800);

        let fractional: TokenResponse =
            serde_json::from_str(r#"{"access_token": "a", "expires_in": "90.5"}"#).unwrap();
        assert_eq!(fractional.into_grant().unwrap().expires_in, 90);
    }

    #[test]
    fn test_unreadable_expires_in_uses_default() {
        for raw in [r#""soon""#, "null", "true", "[]", "{}"] {
            let body = format!(r#"{{"access_token": "a", "expires_in": {}}}"#, raw);
            let parsed: TokenResponse = serde_json::from_str(&body).unwrap();
            assert_eq!(parsed.into_grant().unwrap().expires_in, DEFAULT_EXPIRES_IN_SECS);
        }
    }

    #[test]
    fn test_out_of_range_expires_in_saturates() {
        assert_eq!(lifetime_secs(Some(&serde_json::json!(u64::MAX))), i64::MAX);
        assert_eq!(lifetime_secs(Some(&serde_json::json!(1e300))), i64::MAX);
        assert_eq!(lifetime_secs(Some(&serde_json::json!("1e300"))), i64::MAX);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(150);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_REASON_BODY_LENGTH + 3);
    }
}
