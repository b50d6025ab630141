//! Authorization decision endpoints.
//!
//! `check` answers "may I?" for a resource without touching it, which lets
//! UIs hide what the caller cannot do. `refresh` rebuilds the permission
//! cache on demand after role changes.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use gatekeep_auth::Action;
use gatekeep_core::{Kind, WILDCARD_PROJECT};

use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::Caller;

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub kind: String,
    pub action: Action,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub name: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/check", get(check))
        .route("/refresh", post(refresh))
}

/// GET /api/v1/authz/check?kind=dashboard&action=update&project=shop&name=sales
pub async fn check(
    Extension(services): Extension<Arc<AppServices>>,
    caller: Caller,
    Query(query): Query<CheckQuery>,
) -> axum::response::Response {
    let kind: Kind = match query.kind.parse() {
        Ok(kind) => kind,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_kind", format!("{e}")),
    };

    match authz::check_permission(
        &services.authorizer,
        caller.context(),
        kind,
        query.action,
        &query.project,
        &query.name,
    ) {
        Ok(()) => Json(serde_json::json!({ "allowed": true })).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /api/v1/authz/refresh
///
/// Requires `update` on global roles.
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    caller: Caller,
) -> axum::response::Response {
    if let Err(e) = authz::check_permission(
        &services.authorizer,
        caller.context(),
        Kind::GlobalRole,
        Action::Update,
        WILDCARD_PROJECT,
        "",
    ) {
        return errors::auth_error_to_response(e);
    }

    match services.authorizer.refresh_permissions().await {
        Ok(generation) => (
            StatusCode::OK,
            Json(serde_json::json!({ "generation": generation })),
        )
            .into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
