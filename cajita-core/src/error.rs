//! Top-level error types for Cajita.

use thiserror::Error;

use crate::authenticator::AuthError;
use crate::client::ApiError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Top-level error type encompassing all Cajita errors.
#[derive(Debug, Error)]
pub enum CajitaError {
    /// No token could be obtained.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Error from secret storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A call resolved to a failed outcome.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
