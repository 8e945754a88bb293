//! Collaborator contract for the implicit login helpers
//!
//! Defines the `AuthSdk` trait that decouples login orchestration from the
//! identity provider. Everything protocol-specific lives behind this trait:
//! - `authorize_url` builds the provider's authorize URL from `state` + `nonce`
//! - `exchange_credentials` turns the staged tokens into credentials
//! - `user` materializes a user object from stored credentials
//! - `is_logged_in` validates stored credentials (expiry, revocation, ...)
//!
//! Credentials and users are opaque JSON values. The helpers persist them and
//! hand them back to the SDK; they never look inside.

use std::future::Future;
use std::pin::Pin;

/// Credentials issued by a successful exchange.
pub type Credentials = serde_json::Value;

/// User object materialized from credentials.
pub type User = serde_json::Value;

/// Boxed future returned by the asynchronous SDK operations.
pub type SdkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Errors raised by an SDK implementation.
///
/// The helpers propagate these unmodified; there is no retry or translation
/// layer between the SDK and the caller.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("credential exchange failed: {0}")]
    Exchange(String),

    #[error("credential validation failed: {0}")]
    Validation(String),

    #[error("user lookup failed: {0}")]
    User(String),

    #[error("SDK error: {0}")]
    Other(String),
}

/// Result alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Identity provider SDK supplied by the host application.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn AuthSdk>`).
pub trait AuthSdk: Send + Sync {
    /// Build the authorize URL the browser is sent to.
    ///
    /// Arguments are passed in `(state, nonce)` order.
    fn authorize_url(&self, state: &str, nonce: &str) -> String;

    /// Exchange the staged `state` and `nonce` for credentials after the
    /// provider redirected back.
    fn exchange_credentials<'a>(
        &'a self,
        state: &'a str,
        nonce: &'a str,
    ) -> SdkFuture<'a, Credentials>;

    /// Materialize the user described by `credentials`.
    fn user(&self, credentials: &Credentials) -> Result<User>;

    /// Whether `credentials` still represent a logged-in user.
    ///
    /// `None` means nothing is stored; implementations normally resolve `false`.
    fn is_logged_in<'a>(&'a self, credentials: Option<&'a Credentials>) -> SdkFuture<'a, bool>;
}
