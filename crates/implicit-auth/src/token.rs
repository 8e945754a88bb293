//! One-time `state` / `nonce` token generation
//!
//! Tokens are opaque and only need a consistent shape: four random `u32`
//! values rendered in decimal, Base64-encoded, bounded to 48 characters and
//! kept free of `+` and `/` so they embed cleanly in a query string.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rand::RngExt;

use crate::constants::MAX_TOKEN_LEN;

/// Generate a random token for use as `state` or `nonce`.
///
/// Draws from `rand::rng()`, a CSPRNG seeded from the operating system.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let words: [u32; 4] = [rng.random(), rng.random(), rng.random(), rng.random()];
    let digits: String = words.iter().map(u32::to_string).collect();
    encode_token(&digits)
}

/// Encode raw token material into its bounded, query-safe form.
pub fn encode_token(raw: &str) -> String {
    STANDARD_NO_PAD
        .encode(raw.as_bytes())
        .chars()
        .take(MAX_TOKEN_LEN)
        .map(|c| if c == '+' || c == '/' { '0' } else { c })
        .collect()
}
