use serde::Serialize;

use crate::domain::entities::Identity;

/// The caller as resolved by the pipeline.
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub summary: String,
    #[serde(flatten)]
    pub identity: Identity,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            summary: identity.summary(),
            identity,
        }
    }
}
