//! Login orchestration for the OIDC implicit flow
//!
//! [`AuthHelper`] stages `state` / `nonce` before redirecting to the identity
//! provider, exchanges them for credentials when the provider redirects back,
//! and answers login-state queries from the stored credentials.
//!
//! Errors arrive on two channels. [`AuthHelper::complete_login`] and
//! [`AuthHelper::login`] return an outer `Result` that fails immediately,
//! before any SDK call, when the staged tokens are missing. The
//! [`PendingLogin`] future inside it resolves with the outcome of the
//! delegated exchange, SDK failures included.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use auth_sdk::{AuthSdk, Credentials, User};
use common::Secret;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::constants::{CREDENTIALS_KEY, NONCE_KEY, STATE_KEY};
use crate::error::{Error, Result};
use crate::location::{FlowPhase, Location, NavigationMode, strip_fragment};
use crate::storage::{KeyedStore, StorageBackend};
use crate::token::generate_token;

/// The asynchronous half of a login completion.
pub type PendingLogin<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// What [`AuthHelper::login`] did.
pub enum LoginOutcome<'a> {
    /// Tokens were staged and the location was sent to the provider.
    Redirected,
    /// The provider redirected back; await the exchange.
    Completing(PendingLogin<'a>),
}

impl std::fmt::Debug for LoginOutcome<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redirected => f.write_str("Redirected"),
            Self::Completing(_) => f.write_str("Completing(..)"),
        }
    }
}

/// `state` and `nonce` read back from storage for the exchange.
#[derive(Debug)]
struct StagedTokens {
    state: Secret<String>,
    nonce: Secret<String>,
}

/// Client-side helper for the OIDC implicit login flow.
pub struct AuthHelper {
    sdk: Arc<dyn AuthSdk>,
    store: KeyedStore,
    location: Arc<dyn Location>,
    token_generator: fn() -> String,
}

impl AuthHelper {
    pub fn builder() -> AuthHelperBuilder {
        AuthHelperBuilder::default()
    }

    /// The store holding staged tokens and credentials.
    pub fn store(&self) -> &KeyedStore {
        &self.store
    }

    /// Start a login or finish one, depending on the current URL.
    ///
    /// Before the provider redirect this stages tokens and navigates away,
    /// returning [`LoginOutcome::Redirected`]. After it, this behaves like
    /// [`complete_login`](Self::complete_login).
    pub fn login(&self, redirect_url: Option<&str>, replace: bool) -> Result<LoginOutcome<'_>> {
        let current = self.location.current()?;
        match FlowPhase::detect(&current) {
            FlowPhase::AwaitingRedirect => {
                self.redirect_to_login(replace)?;
                Ok(LoginOutcome::Redirected)
            }
            FlowPhase::ReturningFromRedirect => {
                let pending = self.begin_exchange(&current, redirect_url)?;
                Ok(LoginOutcome::Completing(pending))
            }
        }
    }

    /// Stage fresh `state` / `nonce` tokens and navigate to the authorize URL.
    ///
    /// Clears the whole store first, discarding stale tokens and any
    /// credentials left from a previous user.
    pub fn redirect_to_login(&self, replace: bool) -> Result<()> {
        self.store.clear()?;

        let state = (self.token_generator)();
        let nonce = (self.token_generator)();

        self.store.store(STATE_KEY, state.as_str())?;
        self.store.store(NONCE_KEY, nonce.as_str())?;

        let url = self.sdk.authorize_url(&state, &nonce);
        let mode = NavigationMode::from_replace(replace);
        info!(?mode, "redirecting to identity provider");
        self.location.navigate(&url, mode)
    }

    /// Exchange the staged tokens for credentials after the provider redirect.
    ///
    /// Fails immediately with [`Error::MissingState`] or [`Error::MissingNonce`]
    /// when the tokens were never staged (a tampered or replayed redirect).
    /// Otherwise returns a future that runs the exchange, replaces the store
    /// contents with the credentials and rewrites the location to
    /// `redirect_url`, defaulting to the current URL without its fragment.
    ///
    /// Outside the post-redirect phase the future resolves without doing
    /// anything.
    pub fn complete_login(&self, redirect_url: Option<&str>) -> Result<PendingLogin<'_>> {
        let current = self.location.current()?;
        match FlowPhase::detect(&current) {
            FlowPhase::AwaitingRedirect => {
                debug!("no access token in URL fragment, nothing to complete");
                Ok(Box::pin(async { Ok(()) }))
            }
            FlowPhase::ReturningFromRedirect => self.begin_exchange(&current, redirect_url),
        }
    }

    fn begin_exchange(
        &self,
        current: &url::Url,
        redirect_url: Option<&str>,
    ) -> Result<PendingLogin<'_>> {
        let tokens = self.staged_tokens()?;
        let target = redirect_url
            .map(str::to_owned)
            .unwrap_or_else(|| strip_fragment(current));
        debug!(?tokens, "exchanging staged tokens for credentials");

        Ok(Box::pin(async move {
            let credentials = self
                .sdk
                .exchange_credentials(tokens.state.as_ref(), tokens.nonce.as_ref())
                .await?;

            // Drops the consumed tokens along with anything else lingering.
            self.store.clear()?;
            self.store.store(CREDENTIALS_KEY, credentials)?;
            info!("stored credentials from exchange");

            self.location.replace_history(&target)
        }))
    }

    fn staged_tokens(&self) -> Result<StagedTokens> {
        let state = self
            .retrieve_token(STATE_KEY)
            .ok_or(Error::MissingState)?;
        let nonce = self
            .retrieve_token(NONCE_KEY)
            .ok_or(Error::MissingNonce)?;
        Ok(StagedTokens {
            state: state.into(),
            nonce: nonce.into(),
        })
    }

    fn retrieve_token(&self, key: &str) -> Option<String> {
        match self.store.retrieve_one(key)? {
            Value::String(token) if !token.is_empty() => Some(token),
            Value::String(_) => None,
            _ => {
                warn!(key, "staged token is not a string, ignoring");
                None
            }
        }
    }

    /// Whether the stored credentials are still valid according to the SDK.
    ///
    /// Invalid or expired credentials are removed from the store before this
    /// resolves `false`.
    pub async fn is_logged_in(&self) -> Result<bool> {
        let credentials = self.store.retrieve_one(CREDENTIALS_KEY);
        let logged_in = self.sdk.is_logged_in(credentials.as_ref()).await?;

        if !logged_in {
            if credentials.is_some() {
                debug!("removing invalid credentials");
            }
            self.store.clear_key(CREDENTIALS_KEY)?;
        }

        Ok(logged_in)
    }

    /// Forget everything stored for this session.
    pub fn logout(&self) -> Result<()> {
        info!("logging out");
        self.store.clear()
    }

    /// The user described by the stored credentials.
    ///
    /// Empty credentials (`""`, `false`, `0`, `null`) count as none stored.
    pub fn current_user(&self) -> Result<User> {
        let credentials = self
            .credentials()
            .filter(|c| !is_empty_value(c))
            .ok_or(Error::NoCredentials)?;
        Ok(self.sdk.user(&credentials)?)
    }

    /// Credentials stored by the last successful exchange.
    pub fn credentials(&self) -> Option<Credentials> {
        self.store.retrieve_one(CREDENTIALS_KEY)
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Builder for [`AuthHelper`].
#[derive(Default)]
pub struct AuthHelperBuilder {
    sdk: Option<Arc<dyn AuthSdk>>,
    storage: Option<Arc<dyn StorageBackend>>,
    location: Option<Arc<dyn Location>>,
    namespace: Option<String>,
    token_generator: Option<fn() -> String>,
}

impl AuthHelperBuilder {
    pub fn sdk(mut self, sdk: Arc<dyn AuthSdk>) -> Self {
        self.sdk = Some(sdk);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    /// Namespace key for the store, defaults to `DEFAULT_NAMESPACE`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Replace [`generate_token`] as the source of `state` / `nonce`.
    pub fn token_generator(mut self, generator: fn() -> String) -> Self {
        self.token_generator = Some(generator);
        self
    }

    pub fn build(self) -> Result<AuthHelper> {
        let sdk = self
            .sdk
            .ok_or_else(|| Error::Config("Must supply an SDK".into()))?;
        let storage = self
            .storage
            .ok_or_else(|| Error::Config("Must supply a storage backend".into()))?;
        let location = self
            .location
            .ok_or_else(|| Error::Config("Must supply a location".into()))?;

        let store = match self.namespace {
            Some(namespace) if namespace.trim().is_empty() => {
                return Err(Error::Config("namespace must not be empty".into()));
            }
            Some(namespace) => KeyedStore::with_namespace(storage, namespace),
            None => KeyedStore::new(storage),
        };

        Ok(AuthHelper {
            sdk,
            store,
            location,
            token_generator: self.token_generator.unwrap_or(generate_token),
        })
    }
}
