//! Keyed one-way digests.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of the digest prefix that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

/// HMAC-SHA256 hasher keyed by the server signing secret.
///
/// API keys are stored and looked up by this digest, so an attacker with
/// read-only access to the database can neither verify nor forge keys without
/// the secret. The same hasher fingerprints anonymous clients for rate limiting.
#[derive(Clone)]
pub struct KeyHasher {
    secret: Vec<u8>,
}

impl KeyHasher {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Returns the 64-character lowercase hex digest of `input`.
    pub fn digest(&self, input: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts any key length");
        mac.update(input.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Digest of a client's address and user agent, used as the anonymous
    /// rate-limit key.
    pub fn client_fingerprint(&self, remote_addr: &str, user_agent: &str) -> String {
        self.digest(&format!("{remote_addr}|{user_agent}"))
    }
}

impl std::fmt::Debug for KeyHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHasher").finish_non_exhaustive()
    }
}

/// Non-reversible prefix of a digest, safe to log for diagnostics.
pub fn log_prefix(digest: &str) -> &str {
    digest.get(..LOG_PREFIX_LEN).unwrap_or(digest)
}
