//! Random token generation.

use base64::Engine as _;

/// Bytes of entropy in session ids and CSRF tokens (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Bytes of entropy in a CSP nonce.
const NONCE_BYTES: usize = 16;

/// Generates a URL-safe token carrying [`TOKEN_BYTES`] bytes of OS entropy.
///
/// The result is 43 characters of base64 without padding.
///
/// # Panics
///
/// Panics if the system random number generator fails (extremely rare).
pub fn generate_token() -> String {
    random_base64::<TOKEN_BYTES>()
}

/// Generates a nonce for inline scripts allowed by the Content-Security-Policy.
pub fn generate_nonce() -> String {
    random_base64::<NONCE_BYTES>()
}

fn random_base64<const N: usize>() -> String {
    let mut buffer = [0u8; N];

    getrandom::fill(&mut buffer).expect("Failed to generate random bytes");

    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buffer)
}
