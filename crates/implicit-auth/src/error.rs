//! Error types for the login helpers
//!
//! `MissingState`, `MissingNonce` and `NoCredentials` are raised before any
//! SDK call is made. `Sdk` wraps a delegated failure without changing it.

use auth_sdk::SdkError;

/// Errors from login orchestration, storage and navigation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Config(String),

    #[error("No `state` stored")]
    MissingState,

    #[error("No `nonce` stored")]
    MissingNonce,

    #[error("Cannot get current user: No user credentials stored")]
    NoCredentials,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error(transparent)]
    Sdk(#[from] SdkError),
}

/// Result alias for helper operations.
pub type Result<T> = std::result::Result<T, Error>;
