//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage, identity service and authorizer wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{http::Method, routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware::{self, AnonymousRoutes};

pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, SharedAuthorizer, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        resolver: services.resolver.clone(),
        anonymous: Arc::new(AnonymousRoutes::new().allow(Method::GET, "/health")),
    };

    // Every matched route goes through credential resolution; anonymous ones
    // get an anonymous context.
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", routes::router())
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ))
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
