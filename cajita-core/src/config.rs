//! Client configuration.
//!
//! [`ClientConfig`] is plain data deserialised from TOML. It selects the base
//! URL, tunes token handling, and lists the authentication strategies in
//! priority order. Credentials only ever come from here; there are no
//! built-in fallbacks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{
    AuthStrategy, BackendClientCredentials, IdentityProviderClientCredentials, LoginCredentials,
    PasswordLogin,
};
use crate::store::Secret;
use crate::token::DEFAULT_SKEW_SECONDS;

/// Base URL used in development mode when none is configured.
pub const DEFAULT_DEV_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default transport timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Largest accepted token expiry skew.
pub const MAX_SKEW_SECONDS: i64 = 86_400;

/// Default on-screen lifetime of an error notification.
pub const DEFAULT_NOTIFICATION_DURATION_MS: u64 = 3500;

/// Error type for configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    /// The TOML could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

/// One authentication strategy, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Backend `/login` with one or more credential pairs.
    Password { credentials: Vec<LoginCredentials> },

    /// Backend `/auth/client-credentials`.
    ClientCredentials { client_secret: Secret },

    /// Identity provider token endpoint (client-credentials grant).
    IdentityProvider {
        token_url: String,
        client_id: String,
        client_secret: Secret,
        #[serde(default)]
        audience: Option<String>,
    },
}

impl StrategyConfig {
    /// Instantiate the strategy against the resolved base URL.
    pub fn build(&self, base_url: &str) -> Box<dyn AuthStrategy> {
        match self {
            StrategyConfig::Password { credentials } => {
                Box::new(PasswordLogin::new(base_url, credentials.clone()))
            }
            StrategyConfig::ClientCredentials { client_secret } => {
                Box::new(BackendClientCredentials::new(base_url, client_secret.clone()))
            }
            StrategyConfig::IdentityProvider {
                token_url,
                client_id,
                client_secret,
                audience,
            } => Box::new(IdentityProviderClientCredentials::new(
                token_url.clone(),
                client_id.clone(),
                client_secret.clone(),
                audience.clone(),
            )),
        }
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        match self {
            StrategyConfig::Password { credentials } => {
                if credentials.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "strategy {}: password strategy needs at least one credential pair",
                        index
                    )));
                }
                if credentials.iter().any(|c| c.email.trim().is_empty()) {
                    return Err(ConfigError::invalid(format!(
                        "strategy {}: credential email must not be empty",
                        index
                    )));
                }
            }
            StrategyConfig::ClientCredentials { client_secret } => {
                if client_secret.expose().is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "strategy {}: client_secret must not be empty",
                        index
                    )));
                }
            }
            StrategyConfig::IdentityProvider {
                token_url,
                client_id,
                client_secret,
                ..
            } => {
                url::Url::parse(token_url).map_err(|e| {
                    ConfigError::invalid(format!("strategy {}: invalid token_url: {}", index, e))
                })?;
                if client_id.is_empty() || client_secret.expose().is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "strategy {}: client_id and client_secret are required",
                        index
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Configuration for [`ApiClient`](crate::client::ApiClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Deployment API origin.
    #[serde(default)]
    pub api_base_url: String,

    /// Origin used instead of `api_base_url` when `dev_mode` is set.
    #[serde(default = "default_dev_base_url")]
    pub dev_base_url: String,

    #[serde(default)]
    pub dev_mode: bool,

    /// Seconds subtracted from token expiry before it is considered stale.
    #[serde(default = "default_skew_seconds")]
    pub skew_seconds: i64,

    /// Transport timeout for API calls and every token exchange, including
    /// the identity-provider grant.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_notification_duration_ms")]
    pub notification_duration_ms: u64,

    /// Serialise concurrent authentication behind one attempt.
    #[serde(default)]
    pub single_flight: bool,

    /// Mirror the session token into the OS keyring.
    #[serde(default)]
    pub persist_token: bool,

    /// Authentication strategies, tried in order.
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}

fn default_dev_base_url() -> String {
    DEFAULT_DEV_BASE_URL.to_string()
}

fn default_skew_seconds() -> i64 {
    DEFAULT_SKEW_SECONDS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_notification_duration_ms() -> u64 {
    DEFAULT_NOTIFICATION_DURATION_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            dev_base_url: default_dev_base_url(),
            dev_mode: false,
            skew_seconds: DEFAULT_SKEW_SECONDS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            notification_duration_ms: DEFAULT_NOTIFICATION_DURATION_MS,
            single_flight: false,
            persist_token: false,
            strategies: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Configuration for a deployment origin with no strategies.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Append a strategy at the lowest priority.
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Parse from TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// The origin requests are sent to.
    pub fn base_url(&self) -> &str {
        if self.dev_mode {
            &self.dev_base_url
        } else {
            &self.api_base_url
        }
    }

    /// Build the configured strategies against [`base_url`](Self::base_url).
    pub fn build_strategies(&self) -> Vec<Box<dyn AuthStrategy>> {
        self.strategies
            .iter()
            .map(|s| s.build(self.base_url()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url();
        if base.trim().is_empty() {
            return Err(ConfigError::invalid(if self.dev_mode {
                "dev_base_url is empty"
            } else {
                "api_base_url is empty"
            }));
        }
        url::Url::parse(base)
            .map_err(|e| ConfigError::invalid(format!("invalid base URL {:?}: {}", base, e)))?;

        if !(0..=MAX_SKEW_SECONDS).contains(&self.skew_seconds) {
            return Err(ConfigError::invalid(format!(
                "skew_seconds must be between 0 and {}",
                MAX_SKEW_SECONDS
            )));
        }

        for (index, strategy) in self.strategies.iter().enumerate() {
            strategy.validate(index)?;
        }
        Ok(())
    }
}

/// Join a base URL and an endpoint path with exactly one slash.
pub fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    if endpoint.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        api_base_url = "https://api.example.com"
        skew_seconds = 45
        single_flight = true

        [[strategies]]
        kind = "password"
        credentials = [{ email = "ops@example.com", password = "hunter2" }]

        [[strategies]]
        kind = "client_credentials"
        client_secret = "backend-secret"

        [[strategies]]
        kind = "identity_provider"
        token_url = "https://tenant.auth0.com/oauth/token"
        client_id = "abc"
        client_secret = "def"
        audience = "https://api.example.com"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = ClientConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.base_url(), "https://api.example.com");
        assert_eq!(config.skew_seconds, 45);
        assert!(config.single_flight);
        assert!(!config.persist_token);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.strategies.len(), 3);
        assert!(matches!(
            &config.strategies[0],
            StrategyConfig::Password { credentials } if credentials[0].email == "ops@example.com"
        ));
        config.validate().unwrap();

        let names: Vec<String> = config
            .build_strategies()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["password", "client_credentials", "identity_provider"]);
    }

    #[test]
    fn test_dev_mode_selects_dev_base_url() {
        let mut config = ClientConfig::new("https://api.example.com");
        config.dev_mode = true;
        assert_eq!(config.base_url(), DEFAULT_DEV_BASE_URL);
    }

    #[test]
    fn test_validate_rejects_empty_base_url() {
        let config = ClientConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_validate_bounds_skew() {
        let mut config = ClientConfig::new("https://api.example.com");
        config.skew_seconds = MAX_SKEW_SECONDS;
        assert!(config.validate().is_ok());

        config.skew_seconds = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        config.skew_seconds = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_password_list() {
        let config = ClientConfig::new("https://api.example.com").with_strategy(
            StrategyConfig::Password {
                credentials: vec![],
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_strategy_kind_fails_to_parse() {
        let result = ClientConfig::from_toml_str(
            r#"
            api_base_url = "https://api.example.com"
            [[strategies]]
            kind = "magic"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.b/", "/videos"), "https://a.b/videos");
        assert_eq!(join_url("https://a.b/api", "videos"), "https://a.b/api/videos");
        assert_eq!(join_url("https://a.b", ""), "https://a.b");
    }
}
