//! Security and CORS response headers.
//!
//! Stateless apart from the per-process [`SecurityPolicyConfig`]. Runs first in
//! the pipeline so every response, including rejections and preflights,
//! carries these headers.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::Response,
};

use crate::config::SecurityPolicyConfig;
use crate::error::{ConfigError, GuardError};
use crate::pipeline::{Flow, Guard, RequestContext, RequestKind};
use crate::utils::token::generate_nonce;

const PERMISSIONS_POLICY: &str = "accelerometer=(), ambient-light-sensor=(), autoplay=(), camera=(), \
display-capture=(), encrypted-media=(), fullscreen=(), geolocation=(), gyroscope=(), \
magnetometer=(), microphone=(), midi=(), payment=(), usb=()";

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
const ALLOWED_HEADERS: &str =
    "Content-Type, Authorization, X-CSRF-Token, X-API-Key, X-Requested-With";

const PERMISSIONS_POLICY_HEADER: HeaderName = HeaderName::from_static("permissions-policy");

/// Whether the pipeline continues after the policy ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightOutcome {
    Proceed,
    /// CORS preflight: answer 200 with no body and stop.
    Terminate,
}

/// Attaches security headers and answers CORS preflights.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    config: SecurityPolicyConfig,
    static_headers: HeaderMap,
    max_age: HeaderValue,
}

impl SecurityPolicy {
    /// Builds the policy, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or a configured
    /// value cannot be used as a header.
    pub fn new(config: SecurityPolicyConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut static_headers = HeaderMap::new();
        static_headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        static_headers.insert(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static(config.frame_options.as_str()),
        );
        static_headers.insert(
            header::REFERRER_POLICY,
            header_value("REFERRER_POLICY", &config.referrer_policy)?,
        );
        static_headers.insert(
            PERMISSIONS_POLICY_HEADER,
            HeaderValue::from_static(PERMISSIONS_POLICY),
        );

        if config.hsts_enabled {
            let mut hsts = format!("max-age={}", config.hsts_max_age);
            if config.hsts_include_subdomains {
                hsts.push_str("; includeSubDomains");
            }
            static_headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                header_value("HSTS_MAX_AGE", &hsts)?,
            );
        }

        if config.csp_enabled && !config.csp_nonce {
            static_headers.insert(
                header::CONTENT_SECURITY_POLICY,
                header_value("CSP_DIRECTIVES", config.csp_directives.trim())?,
            );
        }

        let max_age = HeaderValue::from(config.cors_max_age);

        Ok(Self {
            config,
            static_headers,
            max_age,
        })
    }

    pub fn config(&self) -> &SecurityPolicyConfig {
        &self.config
    }

    /// Writes the policy headers for a request into `headers`.
    ///
    /// `origin` is the request's `Origin` header and `nonce` the CSP nonce
    /// for this request, if nonces are enabled.
    pub fn apply(
        &self,
        headers: &mut HeaderMap,
        method: &Method,
        path: &str,
        origin: Option<&str>,
        nonce: Option<&str>,
    ) -> PreflightOutcome {
        for (name, value) in &self.static_headers {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(nonce) = nonce
            && let Ok(value) = HeaderValue::from_str(&self.csp_with_nonce(nonce))
        {
            headers.insert(header::CONTENT_SECURITY_POLICY, value);
        }

        self.apply_cors(headers, origin);

        if self.is_sensitive(path) {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }

        if method == Method::OPTIONS {
            PreflightOutcome::Terminate
        } else {
            PreflightOutcome::Proceed
        }
    }

    fn apply_cors(&self, headers: &mut HeaderMap, origin: Option<&str>) {
        let echoed = origin
            .filter(|o| self.origin_allowed(o))
            .and_then(|o| HeaderValue::from_str(o).ok());

        match echoed {
            Some(origin) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
                headers.append(header::VARY, HeaderValue::from_static("Origin"));
            }
            None => {
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                );
            }
        }

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
    }

    /// An empty allow-list admits every origin.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.config.allowed_origins.is_empty()
            || self.config.allowed_origins.iter().any(|o| o == origin)
    }

    pub fn is_sensitive(&self, path: &str) -> bool {
        self.config.sensitive_paths.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn csp_with_nonce(&self, nonce: &str) -> String {
        self.config
            .csp_directives
            .split(';')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|directive| {
                if directive.starts_with("script-src") {
                    format!("{directive} 'nonce-{nonce}'")
                } else {
                    directive.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::invalid(name, e.to_string()))
}

#[async_trait]
impl Guard for SecurityPolicy {
    fn name(&self) -> &'static str {
        "security_policy"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<Flow, GuardError> {
        if self.config.csp_enabled && self.config.csp_nonce {
            ctx.csp_nonce = Some(generate_nonce());
        }

        let mut headers = HeaderMap::new();
        let outcome = self.apply(
            &mut headers,
            ctx.method(),
            ctx.path(),
            ctx.header(header::ORIGIN),
            ctx.csp_nonce.as_deref(),
        );
        for (name, value) in headers {
            if let Some(name) = name {
                ctx.response_headers.append(name, value);
            }
        }

        if outcome == PreflightOutcome::Terminate && ctx.kind() == RequestKind::Preflight {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::OK;
            return Ok(Flow::Respond(response));
        }

        Ok(Flow::Continue)
    }
}
