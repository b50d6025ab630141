use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use gatekeep_auth::AuthError;
use gatekeep_core::StorageError;

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized"),
        AuthError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        // Unknown org or owner named by the request.
        AuthError::Storage(StorageError::NotFound(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "not_found", msg)
        }
        AuthError::Storage(e) => {
            error!(error = %e, "storage failure during authorization");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e.to_string())
        }
        AuthError::Cache(e) => {
            error!(error = %e, "permission cache unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable", e.to_string())
        }
        AuthError::Internal(msg) => {
            error!(message = %msg, "internal authorization error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use gatekeep_auth::CacheError;

    use super::*;

    #[test]
    fn auth_errors_map_to_statuses() {
        let cases = [
            (AuthError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AuthError::forbidden("no"), StatusCode::FORBIDDEN),
            (AuthError::Storage(StorageError::not_found("user 'x'")), StatusCode::BAD_REQUEST),
            (AuthError::Storage(StorageError::backend("down")), StatusCode::INTERNAL_SERVER_ERROR),
            (AuthError::Cache(CacheError::Closed), StatusCode::SERVICE_UNAVAILABLE),
            (AuthError::internal("oops"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(auth_error_to_response(err).status(), status);
        }
    }
}
