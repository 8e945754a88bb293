//! Client-side helpers for the OpenID Connect implicit flow
//!
//! Stages one-time `state` / `nonce` tokens across the identity provider
//! redirect, captures the returned credentials and answers login-state
//! queries. Authorize-URL construction, credential exchange and validation
//! are delegated to an [`auth_sdk::AuthSdk`] supplied by the host.
//!
//! Login flow:
//! 1. Host calls `AuthHelper::login()` on a page without tokens in the fragment
//! 2. Helper clears the store, stages `token::generate_token()` values and
//!    navigates to `AuthSdk::authorize_url()`
//! 3. Provider redirects back with `access_token` in the fragment
//! 4. Host calls `AuthHelper::login()` again; the helper exchanges the staged
//!    tokens via `AuthSdk::exchange_credentials()`
//! 5. Credentials stored via `storage::KeyedStore::store()`, fragment removed
//!    from the location

pub mod constants;
pub mod error;
pub mod helpers;
pub mod location;
pub mod storage;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use helpers::{AuthHelper, AuthHelperBuilder, LoginOutcome, PendingLogin};
pub use location::{
    FlowPhase, Location, MemoryLocation, Navigation, NavigationKind, NavigationMode,
    strip_fragment,
};
pub use storage::{FileStorage, KeyedStore, MemoryStorage, StorageBackend};
pub use token::{encode_token, generate_token};
