use serde::Serialize;

/// CSRF token for clients that submit it via header or JSON body.
#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}
