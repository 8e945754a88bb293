//! Storage keys and markers shared by the login helpers

/// Default key under which the namespace blob lives in the storage medium
pub const DEFAULT_NAMESPACE: &str = "__OIDC_SESSION__";

/// Blob key holding the staged `state` token
pub const STATE_KEY: &str = "state";

/// Blob key holding the staged `nonce` token
pub const NONCE_KEY: &str = "nonce";

/// Blob key holding the credentials issued by the SDK
pub const CREDENTIALS_KEY: &str = "credentials";

/// The implicit flow puts `access_token` (among other things) in the URL
/// fragment when the provider redirects back.
pub const ACCESS_TOKEN_MARKER: &str = "access_token";

/// Upper bound on generated token length
pub const MAX_TOKEN_LEN: usize = 48;
