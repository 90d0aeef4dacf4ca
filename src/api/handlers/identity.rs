use axum::{Extension, Json};

use crate::api::dto::identity::IdentityResponse;
use crate::domain::entities::Identity;
use crate::error::{AppError, AuthError, GuardError};
use crate::pipeline::RequestKind;

/// Returns the identity the pipeline resolved for this request.
///
/// # Endpoint
///
/// `GET /api/me`
///
/// # Errors
///
/// - **401 Unauthorized**: no API key and no logged-in session
pub async fn me_handler(
    Extension(identity): Extension<Identity>,
) -> Result<Json<IdentityResponse>, AppError> {
    if identity == Identity::Anonymous {
        return Err(AppError::from_guard(
            &GuardError::Auth(AuthError::NoCredential),
            RequestKind::Api,
        ));
    }

    Ok(Json(IdentityResponse::from(identity)))
}
