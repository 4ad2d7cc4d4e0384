//! # Cajita Core
//!
//! Authenticated API client for the La Cajita content backend.
//!
//! This crate provides:
//! - A token store holding the current bearer token, optionally persisted
//!   through a secret store
//! - An authenticator that tries an ordered list of strategies
//! - A request executor that injects the token and retries once on 401
//! - An error reporter that surfaces failed calls as notifications
//! - Typed content resources on top of the executor
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cajita_core::{ApiClient, ClientConfig, ContentApi, LogSink, Segment};
//!
//! async fn segments(config: &ClientConfig) -> Result<Vec<Segment>, cajita_core::CajitaError> {
//!     let client = ApiClient::from_config(config, Arc::new(LogSink))?;
//!     Ok(ContentApi::new(client).list::<Segment>().await?)
//! }
//! ```

pub mod auth;
pub mod authenticator;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod model;
pub mod reporter;
pub mod store;
pub mod token;

pub use auth::{
    AuthResult, AuthStrategy, BackendClientCredentials, IdentityProviderClientCredentials,
    LoginCredentials, PasswordLogin, TokenGrant,
};

pub use authenticator::{AuthError, Authenticator};

pub use client::{
    ApiClient, ApiError, ApiRequest, CallState, FailureKind, MultipartField, RequestBody,
    RequestOutcome, ResponseFormat,
};

pub use config::{ClientConfig, ConfigError, StrategyConfig};

pub use content::{ConnectionReport, ContentApi, ProbeResult};

pub use error::CajitaError;

pub use model::{
    CurrentUser, HealthStatus, HomeCarouselItem, LiveTvChannel, Playlist, PlaylistCatalog,
    Resource, Season, Segment, Video,
};

pub use reporter::{ErrorReporter, LogSink, NoopSink, Notification, NotificationSink, ToastQueue};

pub use store::{MemoryStore, Secret, SecretStore, StoreError, create_store};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use token::{Token, TokenStatus, TokenStore, TokenType};
