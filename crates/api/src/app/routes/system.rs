use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::services::AppServices;

/// Liveness plus the permission cache lifecycle state.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "permissions": services.authorizer.status(),
    }))
}
