//! Resource-owner password login against the backend.

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};

use super::{AuthResult, AuthStrategy, read_grant};
use crate::config::join_url;
use crate::store::Secret;
use crate::token::TokenType;

/// One email/password pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: Secret,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Secret::new(password),
        }
    }
}

/// `POST {base}/login?email=..&password=..` with a form content type and no body.
///
/// Credential pairs are tried in order; the first accepted pair wins.
pub struct PasswordLogin {
    login_url: String,
    credentials: Vec<LoginCredentials>,
}

impl PasswordLogin {
    pub fn new(base_url: &str, credentials: Vec<LoginCredentials>) -> Self {
        Self {
            login_url: join_url(base_url, "/login"),
            credentials,
        }
    }

    async fn login(&self, http: &reqwest::Client, creds: &LoginCredentials) -> AuthResult {
        let sent = http
            .post(&self.login_url)
            .query(&[
                ("email", creds.email.as_str()),
                ("password", creds.password.expose()),
            ])
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .send()
            .await;

        match sent {
            Ok(response) => read_grant(response).await,
            Err(e) => AuthResult::rejected(format!("login request failed: {}", e)),
        }
    }
}

#[async_trait]
impl AuthStrategy for PasswordLogin {
    fn name(&self) -> &str {
        "password"
    }

    fn token_type(&self) -> TokenType {
        TokenType::Password
    }

    async fn attempt(&self, http: &reqwest::Client) -> AuthResult {
        let mut last_reason = String::from("no credentials configured");

        for creds in &self.credentials {
            tracing::debug!(email = %creds.email, "Trying password login");
            match self.login(http, creds).await {
                AuthResult::Granted(grant) => return AuthResult::Granted(grant),
                AuthResult::Rejected { reason } => {
                    tracing::debug!(email = %creds.email, %reason, "Password login rejected");
                    last_reason = format!("{}: {}", creds.email, reason);
                }
            }
        }

        AuthResult::rejected(last_reason)
    }
}
