//! HTTP request/response tracing middleware.

use axum::http::Request;
use tower_http::LatencyUnit;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, MakeSpan, TraceLayer};
use tracing::{Level, Span};

/// Request span that records the path but never the query string.
///
/// API keys may travel as `?api_key=`, so the full URI must stay out of logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathSpan;

impl<B> MakeSpan<B> for PathSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            version = ?request.version(),
        )
    }
}

pub type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    PathSpan,
    DefaultOnRequest,
    DefaultOnResponse,
>;

/// Creates a tracing middleware for HTTP requests.
///
/// # Logging Behavior
///
/// **On Request:** an `INFO` span with method, path and HTTP version.
///
/// **On Response:** an `INFO` event with status code and latency in milliseconds.
///
/// # Example Logs
///
/// ```text
/// INFO request{method=POST path=/threads/7/posts version=HTTP/1.1}: finished processing request latency=12 ms status=302
/// INFO request{method=GET path=/api/me version=HTTP/1.1}: finished processing request latency=1 ms status=401
/// ```
///
/// # Integration
///
/// The layer sits outside the pipeline middleware, so rejected requests
/// get a span too.
///
/// ```rust,ignore
/// let app = Router::new()
///     .merge(routes)
///     .layer(middleware::from_fn_with_state(dispatcher, pipeline::layer))
///     .layer(tracing::layer());
/// ```
pub fn layer() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(PathSpan)
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}
