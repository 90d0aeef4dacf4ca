//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Credential store**: sessions, accounts and API keys
/// 2. **Rate limit store**: Postgres or Redis event log
/// 3. **Audit queue**: Checks if the channel is open and reports free slots
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "credential_store": { "status": "ok", "message": "Connected" },
///     "rate_limit_store": { "status": "ok", "message": "Connected" },
///     "audit_queue": { "status": "ok", "message": "Capacity: 10000" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let credential_check = if state.sessions.health_check().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Credential store unreachable")
    };

    let rate_limit_check = if state.rate_limiter.health_check().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Rate limit store unreachable")
    };

    let queue_check = check_audit_queue(&state);

    let all_healthy = credential_check.is_ok() && rate_limit_check.is_ok() && queue_check.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            credential_store: credential_check,
            rate_limit_store: rate_limit_check,
            audit_queue: queue_check,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

fn check_audit_queue(state: &AppState) -> CheckStatus {
    if state.auditor.is_closed() {
        CheckStatus::error("Audit queue is closed")
    } else {
        CheckStatus::ok(format!("Capacity: {}", state.auditor.queue_capacity()))
    }
}
