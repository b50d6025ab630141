//! Endpoints describing the calling user.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use gatekeep_auth::{Action, Scope};

use crate::app::{errors, services::AppServices};
use crate::context::Caller;

#[derive(Debug, Deserialize)]
pub struct ProjectsQuery {
    pub action: Action,
    pub scope: Scope,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(whoami))
        .route("/permissions", get(permissions))
        .route("/projects", get(projects))
}

/// GET /api/v1/me
pub async fn whoami(caller: Caller) -> axum::response::Response {
    let ctx = caller.context();
    let user = match ctx.user() {
        Ok(user) => user,
        Err(e) => return errors::auth_error_to_response(e),
    };
    Json(serde_json::json!({
        "user": user,
        "org": ctx.org(),
    }))
    .into_response()
}

/// GET /api/v1/me/permissions
pub async fn permissions(
    Extension(services): Extension<Arc<AppServices>>,
    caller: Caller,
) -> axum::response::Response {
    match services.authorizer.get_permissions(Some(caller.context())) {
        Ok(permissions) => Json(permissions).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// GET /api/v1/me/projects?action=read&scope=Dashboard
pub async fn projects(
    Extension(services): Extension<Arc<AppServices>>,
    caller: Caller,
    Query(query): Query<ProjectsQuery>,
) -> axum::response::Response {
    match services
        .authorizer
        .get_user_projects(Some(caller.context()), query.action, query.scope)
    {
        Ok(mut projects) => {
            projects.sort();
            Json(serde_json::json!({ "projects": projects })).into_response()
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}
