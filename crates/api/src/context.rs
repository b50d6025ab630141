use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use gatekeep_auth::RequestContext;

/// Identity of the caller, as attached by the auth middleware.
///
/// Never rejects: a request that reached a handler without passing through the
/// middleware gets an unresolved context, which every check treats as
/// unauthorized.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(RequestContext::unresolved);
        Ok(Caller(ctx))
    }
}

impl Caller {
    pub fn context(&self) -> &RequestContext {
        &self.0
    }
}
