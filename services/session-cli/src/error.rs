//! CLI error types

use thiserror::Error;

/// Errors from parsing and running a session command.
#[derive(Error, Debug)]
pub enum Error {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("value is not valid JSON: {0}")]
    InvalidValue(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] implicit_auth::Error),
}

/// Result alias using the CLI Error
pub type Result<T> = std::result::Result<T, Error>;
