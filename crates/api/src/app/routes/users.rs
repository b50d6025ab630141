use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};

use gatekeep_auth::AuthError;

use crate::app::{errors, services::AppServices};
use crate::context::Caller;

pub fn router() -> Router {
    Router::new().route("/:owner/permissions", get(owner_permissions))
}

/// GET /api/v1/users/:owner/permissions
///
/// The middleware already checked that the caller is the owner or one of its
/// organization members.
pub async fn owner_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    caller: Caller,
) -> axum::response::Response {
    let Some(owner) = caller.context().owner() else {
        return errors::auth_error_to_response(AuthError::Unauthorized);
    };
    Json(services.authorizer.permissions_of(&owner.name)).into_response()
}
