use axum::Router;

pub mod authz;
pub mod me;
pub mod system;
pub mod users;

/// Router for every `/api/v1` endpoint; all of them require a caller.
pub fn router() -> Router {
    Router::new()
        .nest("/me", me::router())
        .nest("/authz", authz::router())
        .nest("/users", users::router())
}
