//! Client-credentials grant through the backend's own token endpoint.

use async_trait::async_trait;
use reqwest::header;
use serde_json::json;

use super::{AuthResult, AuthStrategy, read_grant};
use crate::config::join_url;
use crate::store::Secret;
use crate::token::TokenType;

/// `POST {base}/auth/client-credentials` with `{"client_secret": ...}`.
pub struct BackendClientCredentials {
    token_url: String,
    client_secret: Secret,
}

impl BackendClientCredentials {
    pub fn new(base_url: &str, client_secret: Secret) -> Self {
        Self {
            token_url: join_url(base_url, "/auth/client-credentials"),
            client_secret,
        }
    }
}

#[async_trait]
impl AuthStrategy for BackendClientCredentials {
    fn name(&self) -> &str {
        "client_credentials"
    }

    fn token_type(&self) -> TokenType {
        TokenType::ClientCredentials
    }

    async fn attempt(&self, http: &reqwest::Client) -> AuthResult {
        let sent = http
            .post(&self.token_url)
            .header(header::ACCEPT, "application/json")
            .json(&json!({ "client_secret": self.client_secret.expose() }))
            .send()
            .await;

        match sent {
            Ok(response) => read_grant(response).await,
            Err(e) => AuthResult::rejected(format!("client credentials request failed: {}", e)),
        }
    }
}
