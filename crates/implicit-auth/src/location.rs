//! Browser location abstraction and login flow phase detection
//!
//! The helpers never touch ambient browser state. Reading the current URL,
//! navigating and rewriting history all go through a [`Location`] supplied by
//! the host, so an in-memory implementation can stand in for tests.

use std::sync::Mutex;

use url::Url;

use crate::constants::ACCESS_TOKEN_MARKER;
use crate::error::{Error, Result};

/// How a navigation treats the current history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// Push a new history entry (`location.assign`)
    Assign,
    /// Replace the current history entry (`location.replace`)
    Replace,
}

impl NavigationMode {
    pub fn from_replace(replace: bool) -> Self {
        if replace { Self::Replace } else { Self::Assign }
    }
}

/// Read and change the host's current location.
pub trait Location: Send + Sync {
    /// The current URL, fragment included.
    fn current(&self) -> Result<Url>;

    /// Navigate to `url`. In a browser this normally ends the current
    /// execution context, but callers must not rely on it.
    fn navigate(&self, url: &str, mode: NavigationMode) -> Result<()>;

    /// Rewrite the current URL without navigating or adding a history entry.
    fn replace_history(&self, url: &str) -> Result<()>;
}

/// Which side of the provider redirect the current page is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    /// No credentials in the URL; login must start by redirecting.
    AwaitingRedirect,
    /// The provider redirected back with tokens in the fragment.
    ReturningFromRedirect,
}

impl FlowPhase {
    /// Lightweight check for an access token in the URL fragment.
    ///
    /// Only a heuristic; the exchange decides whether the tokens are valid.
    pub fn detect(url: &Url) -> Self {
        match url.fragment() {
            Some(fragment) if fragment.contains(ACCESS_TOKEN_MARKER) => {
                Self::ReturningFromRedirect
            }
            _ => Self::AwaitingRedirect,
        }
    }
}

/// `url` with its fragment removed.
pub fn strip_fragment(url: &Url) -> String {
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    stripped.into()
}

/// Kind of location change recorded by [`MemoryLocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Assign,
    Replace,
    HistoryReplace,
}

/// A recorded location change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub kind: NavigationKind,
    pub url: String,
}

/// In-memory [`Location`] that tracks the current URL and records every change.
#[derive(Debug)]
pub struct MemoryLocation {
    current: Mutex<Url>,
    navigations: Mutex<Vec<Navigation>>,
}

impl MemoryLocation {
    pub fn new(url: Url) -> Self {
        Self {
            current: Mutex::new(url),
            navigations: Mutex::new(Vec::new()),
        }
    }

    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self::new(parse_url(url)?))
    }

    /// Point the location at `url` without recording a navigation.
    pub fn set_current(&self, url: &str) -> Result<()> {
        let url = parse_url(url)?;
        *self.lock_current()? = url;
        Ok(())
    }

    /// Every recorded change, oldest first.
    pub fn navigations(&self) -> Result<Vec<Navigation>> {
        Ok(self.lock_navigations()?.clone())
    }

    fn lock_navigations(&self) -> Result<std::sync::MutexGuard<'_, Vec<Navigation>>> {
        self.navigations
            .lock()
            .map_err(|_| Error::Navigation("location lock poisoned".into()))
    }

    fn lock_current(&self) -> Result<std::sync::MutexGuard<'_, Url>> {
        self.current
            .lock()
            .map_err(|_| Error::Navigation("location lock poisoned".into()))
    }

    /// Relative targets resolve against the current URL, as in a browser.
    fn record(&self, kind: NavigationKind, url: &str) -> Result<()> {
        let mut current = self.lock_current()?;
        let resolved = current
            .join(url)
            .map_err(|e| Error::Navigation(format!("invalid URL {url:?}: {e}")))?;
        self.lock_navigations()?.push(Navigation {
            kind,
            url: resolved.to_string(),
        });
        *current = resolved;
        Ok(())
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> Result<Url> {
        Ok(self.lock_current()?.clone())
    }

    fn navigate(&self, url: &str, mode: NavigationMode) -> Result<()> {
        let kind = match mode {
            NavigationMode::Assign => NavigationKind::Assign,
            NavigationMode::Replace => NavigationKind::Replace,
        };
        self.record(kind, url)
    }

    fn replace_history(&self, url: &str) -> Result<()> {
        self.record(NavigationKind::HistoryReplace, url)
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::Navigation(format!("invalid URL {url:?}: {e}")))
}
