//! Helpers shared by the services and the pipeline.
//!
//! - [`token`] - Cryptographically random session ids, CSRF tokens and nonces
//! - [`digest`] - Keyed digests for API keys and client fingerprints
//! - [`headers`] - Cookie, client address and content-type parsing

pub mod digest;
pub mod headers;
pub mod token;
