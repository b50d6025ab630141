//! Credential resolution: who is making this request.
//!
//! Two paths, tried in order: the session path relays cookies to the external
//! identity service; the token path verifies an opaque access token taken from
//! the request parameters or the `Authorization` header.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use tracing::debug;

use gatekeep_auth::{
    AccessTokenError, AccessTokenStore, AccessTokenVerifier, AuthError, NameCase, RequestContext,
    User, UserDirectory,
};
use gatekeep_core::StorageError;

use crate::identity_service::{IdentityService, SessionCredentials};

/// What the resolver needs to know about an inbound request.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub anonymous: bool,
    pub headers: HeaderMap,
    /// Form body parameters followed by query parameters.
    pub params: Vec<(String, String)>,
    /// Value of the `owner` path parameter, if the route has one.
    pub owner: Option<String>,
}

impl InboundRequest {
    pub(crate) fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user: User,
    /// Organization acted for, when `user` is its system user.
    pub org: Option<User>,
    /// Owner named by the route, once membership was checked.
    pub owner: Option<User>,
}

impl ResolvedIdentity {
    pub fn into_context(self) -> RequestContext {
        let mut ctx = RequestContext::authenticated(self.user);
        if let Some(org) = self.org {
            ctx = ctx.with_org(org);
        }
        if let Some(owner) = self.owner {
            ctx = ctx.with_owner(owner);
        }
        ctx
    }
}

/// Opaque token carried by the request, in priority order: `token` param,
/// `access_token` param, then `Authorization: token <v>` / `Bearer <v>`.
pub fn extract_token(request: &InboundRequest) -> Option<String> {
    if let Some(token) = request.param("token").or_else(|| request.param("access_token")) {
        return Some(token.to_string());
    }
    let value = request.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut fields = value.split_whitespace();
    let (scheme, token) = (fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }
    (scheme == "token" || scheme.eq_ignore_ascii_case("bearer")).then(|| token.to_string())
}

/// Maps requests to local users.
pub struct CredentialResolver {
    users: Arc<dyn UserDirectory>,
    tokens: AccessTokenVerifier<Arc<dyn AccessTokenStore>>,
    identity: Arc<dyn IdentityService>,
    names: NameCase,
}

impl CredentialResolver {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        tokens: Arc<dyn AccessTokenStore>,
        identity: Arc<dyn IdentityService>,
        names: NameCase,
    ) -> Self {
        Self {
            users,
            tokens: AccessTokenVerifier::new(tokens),
            identity,
            names,
        }
    }

    /// Resolve the caller of `request`.
    ///
    /// `Ok(None)` for anonymous routes. Fails with `Unauthorized` when neither
    /// path yields a known user, and `Forbidden` when the caller does not
    /// belong to the owner named by the route.
    pub async fn resolve(&self, request: &InboundRequest) -> Result<Option<ResolvedIdentity>, AuthError> {
        if request.anonymous {
            return Ok(None);
        }

        let user = match self.login_with_session(request).await? {
            Some(user) => user,
            None => self.login_with_access_token(request).await?,
        };

        let org = match user.system_org_name() {
            Some(org_name) => Some(self.lookup(org_name).await?),
            None => None,
        };

        let owner = match request.owner.as_deref().filter(|o| !o.is_empty()) {
            Some(owner_name) => Some(self.check_owner(&user, owner_name).await?),
            None => None,
        };

        Ok(Some(ResolvedIdentity { user, org, owner }))
    }

    /// Session path; `Ok(None)` means fall through to the token path.
    async fn login_with_session(&self, request: &InboundRequest) -> Result<Option<User>, AuthError> {
        let session = SessionCredentials::from_headers(&request.headers);
        if !session.has_cookies() {
            return Ok(None);
        }
        let external = match self.identity.current_user(&session).await {
            Ok(external) => external,
            Err(err) => {
                debug!(error = %err, "session login failed, trying access token");
                return Ok(None);
            }
        };
        match self.users.user_by_name(&self.names.normalize(&external.username)).await {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.is_not_found() => {
                debug!(login = %external.username, "session user has no local account");
                Err(AuthError::Unauthorized)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn login_with_access_token(&self, request: &InboundRequest) -> Result<User, AuthError> {
        let token = extract_token(request).ok_or(AuthError::Unauthorized)?;
        let record = match self.tokens.verify(&token).await {
            Ok(record) => record,
            Err(AccessTokenError::NotExist) => return Err(AuthError::Unauthorized),
            Err(AccessTokenError::Storage(err)) => return Err(err.into()),
        };
        match self.users.user_by_id(record.uid).await {
            Ok(user) => Ok(user),
            Err(err) if err.is_not_found() => Err(AuthError::Unauthorized),
            Err(err) => Err(err.into()),
        }
    }

    /// The caller must be the owner, or belong to the owner organization.
    async fn check_owner(&self, user: &User, owner_name: &str) -> Result<User, AuthError> {
        let owner = self.lookup(owner_name).await?;
        if owner.name == user.name {
            return Ok(owner);
        }
        let orgs = self.users.organizations_of(&user.name).await?;
        if orgs.iter().any(|org| org.name == owner.name) {
            Ok(owner)
        } else {
            Err(AuthError::forbidden(format!(
                "'{}' is not a member of '{}'",
                user.name, owner.name
            )))
        }
    }

    async fn lookup(&self, name: &str) -> Result<User, AuthError> {
        self.users
            .user_by_name(&self.names.normalize(name))
            .await
            .map_err(|e: StorageError| e.into())
    }
}
