//! Axum adapter for the protection pipeline.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::pipeline::Dispatcher;

/// Runs the request through the [`Dispatcher`] and, if every guard passes,
/// the rest of the router.
///
/// The dispatch runs on its own task so that store writes already in flight
/// (session touches, rate-limit events) finish even if the client goes away.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/threads", get(list_threads))
///     .layer(middleware::from_fn_with_state(dispatcher, pipeline::layer));
/// ```
pub async fn layer(
    State(dispatcher): State<Arc<Dispatcher>>,
    req: Request,
    next: Next,
) -> Response {
    let task = tokio::spawn(async move {
        dispatcher
            .dispatch(req, move |req| next.run(req))
            .await
    });

    match task.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(target: "forum_guard::ops", error = %e, "Pipeline task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
