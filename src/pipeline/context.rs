//! Per-request context threaded through every guard.

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderName, Method, Version, header, request::Parts},
};
use std::net::{IpAddr, SocketAddr};

use crate::domain::entities::{Identity, Session};
use crate::error::GuardError;
use crate::utils::headers::{client_ip, cookie_value};

/// Structured classification of a request, computed once at ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// CORS preflight (`OPTIONS`), answered by the security policy.
    Preflight,
    /// Machine client: `/api` paths, or requests carrying an API credential
    /// or asking for JSON only.
    Api,
    /// Everything else; failures render as HTML.
    Browser,
}

impl RequestKind {
    pub fn classify(method: &Method, path: &str, headers: &HeaderMap, query: Option<&str>) -> Self {
        if method == Method::OPTIONS {
            return Self::Preflight;
        }

        if path == "/api" || path.starts_with("/api/") {
            return Self::Api;
        }

        let carries_key = headers.contains_key(header::AUTHORIZATION)
            || headers.contains_key("x-api-key")
            || query.is_some_and(|q| {
                url::form_urlencoded::parse(q.as_bytes()).any(|(k, _)| k == "api_key")
            });
        if carries_key {
            return Self::Api;
        }

        let wants_json = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.trim_start().starts_with("application/json"));
        if wants_json {
            return Self::Api;
        }

        Self::Browser
    }
}

/// Ingress settings fixed at startup.
#[derive(Debug, Clone)]
pub struct IngressOptions {
    pub behind_proxy: bool,
    pub max_body_bytes: usize,
}

impl Default for IngressOptions {
    fn default() -> Self {
        Self {
            behind_proxy: false,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Nonce that inline scripts must carry to satisfy the CSP.
///
/// Inserted into request extensions for the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(pub String);

enum BufferedBody {
    Pending(Body),
    Ready(Bytes),
    Failed,
}

/// The request as seen by the guards.
///
/// Owns the request until the chain completes; [`RequestContext::into_request`]
/// hands it to the downstream handler with the resolved identity attached.
pub struct RequestContext {
    parts: Parts,
    body: BufferedBody,
    kind: RequestKind,
    remote_addr: Option<IpAddr>,
    max_body_bytes: usize,
    pub identity: Identity,
    pub session: Option<Session>,
    /// Headers every response to this request must carry, including rejections.
    pub response_headers: HeaderMap,
    pub csp_nonce: Option<String>,
}

impl RequestContext {
    pub fn new(req: Request, options: &IngressOptions) -> Self {
        let (parts, body) = req.into_parts();

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let remote_addr = client_ip(&parts.headers, peer, options.behind_proxy);
        let kind = RequestKind::classify(
            &parts.method,
            parts.uri.path(),
            &parts.headers,
            parts.uri.query(),
        );

        Self {
            parts,
            body: BufferedBody::Pending(body),
            kind,
            remote_addr,
            max_body_bytes: options.max_body_bytes,
            identity: Identity::Anonymous,
            session: None,
            response_headers: HeaderMap::new(),
            csp_nonce: None,
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn version(&self) -> Version {
        self.parts.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn parts_mut(&mut self) -> &mut Parts {
        &mut self.parts
    }

    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.parts
            .headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.header(header::USER_AGENT).unwrap_or("-")
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        cookie_value(&self.parts.headers, name)
    }

    /// First value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.parts.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// `true` for methods that may change server state.
    pub fn is_state_changing(&self) -> bool {
        !matches!(
            self.parts.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }

    /// Buffers the body (once) and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::PayloadTooLarge`] when the body exceeds the
    /// configured limit or cannot be read.
    pub async fn body_bytes(&mut self) -> Result<&Bytes, GuardError> {
        let state = std::mem::replace(&mut self.body, BufferedBody::Failed);
        self.body = match state {
            BufferedBody::Pending(body) => BufferedBody::Ready(
                axum::body::to_bytes(body, self.max_body_bytes)
                    .await
                    .map_err(|_| GuardError::PayloadTooLarge)?,
            ),
            other => other,
        };

        match &self.body {
            BufferedBody::Ready(bytes) => Ok(bytes),
            _ => Err(GuardError::PayloadTooLarge),
        }
    }

    /// Adds a response header that replaces any value the handler sets.
    pub fn set_response_header(&mut self, name: HeaderName, value: axum::http::HeaderValue) {
        self.response_headers.insert(name, value);
    }

    /// Rebuilds the request for the downstream handler.
    ///
    /// The identity, session and CSP nonce are attached as extensions. Returns
    /// the collected response headers alongside.
    pub fn into_request(self) -> (Request, HeaderMap) {
        let Self {
            mut parts,
            body,
            identity,
            session,
            response_headers,
            csp_nonce,
            ..
        } = self;

        parts.extensions.insert(identity);
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        if let Some(nonce) = csp_nonce {
            parts.extensions.insert(CspNonce(nonce));
        }

        let body = match body {
            BufferedBody::Pending(body) => body,
            BufferedBody::Ready(bytes) => Body::from(bytes),
            BufferedBody::Failed => Body::empty(),
        };

        (Request::from_parts(parts, body), response_headers)
    }

    pub fn into_response_headers(self) -> HeaderMap {
        self.response_headers
    }
}
