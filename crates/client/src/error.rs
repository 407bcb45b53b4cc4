//! Unified error handling for the client library.
//!
//! Cart mutations never return errors - persistence failures are resolved
//! internally and degrade gracefully (see [`crate::cart`]). This type covers
//! the operations that do fail hard: configuration loading, session setup,
//! and identity-dependent calls.

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration loading failed.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Local storage operation failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Remote cart gateway operation failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// HTTP client construction or transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;
