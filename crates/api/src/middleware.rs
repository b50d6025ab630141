use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, MatchedPath, RawPathParams, Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use gatekeep_auth::RequestContext;

use crate::app::errors::{auth_error_to_response, json_error};
use crate::resolver::{CredentialResolver, InboundRequest};

/// Same ceiling axum applies to extracted bodies.
const MAX_FORM_BODY: usize = 2 * 1024 * 1024;

/// Routes that never require an identity, keyed by method and route template.
#[derive(Debug, Clone, Default)]
pub struct AnonymousRoutes {
    routes: HashSet<(Method, String)>,
}

impl AnonymousRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, method: Method, route: impl Into<String>) -> Self {
        self.routes.insert((method, route.into()));
        self
    }

    pub fn is_anonymous(&self, method: &Method, route: &str) -> bool {
        self.routes.contains(&(method.clone(), route.to_string()))
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<CredentialResolver>,
    pub anonymous: Arc<AnonymousRoutes>,
}

/// Resolve the caller and attach a `RequestContext` to the request.
///
/// Must be installed with `route_layer` so the matched route and its path
/// parameters are known.
pub async fn auth_middleware(State(state): State<AuthState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    let anonymous = parts
        .extensions
        .get::<MatchedPath>()
        .is_some_and(|route| state.anonymous.is_anonymous(&parts.method, route.as_str()));

    let owner = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(key, _)| *key == "owner")
                .map(|(_, value)| value.to_string())
        });

    let (params, body) = if is_form(&parts.headers) {
        let bytes = match axum::body::to_bytes(body, MAX_FORM_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string()),
        };
        (request_params(parts.uri.query(), Some(&bytes[..])), Body::from(bytes))
    } else {
        (request_params(parts.uri.query(), None), body)
    };

    let inbound = InboundRequest {
        anonymous,
        headers: parts.headers.clone(),
        params,
        owner,
    };

    let ctx = match state.resolver.resolve(&inbound).await {
        Ok(Some(identity)) => identity.into_context(),
        Ok(None) => RequestContext::anonymous(),
        Err(err) => {
            debug!(error = %err, method = %parts.method, path = %parts.uri.path(), "request rejected");
            return auth_error_to_response(err);
        }
    };

    parts.extensions.insert(ctx);
    next.run(Request::from_parts(parts, body)).await
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Decoded form parameters, body pairs ahead of query pairs so a body value
/// wins when a key appears in both.
fn request_params(query: Option<&str>, body: Option<&[u8]>) -> Vec<(String, String)> {
    let body = body.into_iter().flat_map(url::form_urlencoded::parse);
    let query = query
        .into_iter()
        .flat_map(|raw| url::form_urlencoded::parse(raw.as_bytes()));
    body.chain(query)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}
