use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use gatekeep_core::{StorageError, WILDCARD_PROJECT};

use crate::cache::{CacheError, CacheStatus, PermissionCache};
use crate::loader::load_all_permissions;
use crate::permissions::{Action, Permission, Scope, list_has_permission};
use crate::principal::RequestContext;
use crate::store::PermissionSource;
use crate::user::NameCase;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl AuthError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Answers authorization questions for resolved requests.
///
/// Owns the permission cache and the source it is rebuilt from. Decisions are
/// served from the installed snapshot; only `refresh_permissions` touches
/// storage.
pub struct Authorizer<S> {
    source: S,
    cache: Arc<PermissionCache>,
    guest_permissions: Vec<Permission>,
    names: NameCase,
}

impl<S> Authorizer<S>
where
    S: PermissionSource,
{
    pub fn new(source: S, guest_permissions: Vec<Permission>, names: NameCase) -> Self {
        Self {
            source,
            cache: Arc::new(PermissionCache::new()),
            guest_permissions,
            names,
        }
    }

    /// Share an existing cache instead of creating a fresh one.
    pub fn with_cache(mut self, cache: Arc<PermissionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<PermissionCache> {
        &self.cache
    }

    pub fn guest_permissions(&self) -> &[Permission] {
        &self.guest_permissions
    }

    pub fn names(&self) -> NameCase {
        self.names
    }

    pub fn status(&self) -> CacheStatus {
        self.cache.status()
    }

    /// Rebuild the index from storage and install it.
    ///
    /// On failure the installed snapshot is left untouched. Returns the
    /// generation of the new snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_permissions(&self) -> Result<u64, AuthError> {
        let index = load_all_permissions(&self.source, self.names).await?;
        let users = index.len();
        let generation = self.cache.install(index)?;
        info!(generation, users, "permission cache refreshed");
        Ok(generation)
    }

    /// Whether the request may perform `action` on `scope` within `project`.
    ///
    /// `ctx == None` marks an internal call and is always allowed.
    pub fn has_permission(
        &self,
        ctx: Option<&RequestContext>,
        action: Action,
        project: &str,
        scope: Scope,
    ) -> bool {
        let Some(ctx) = ctx else {
            return true;
        };
        if ctx.is_anonymous() {
            return true;
        }
        let username = match ctx.username() {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => {
                error!("no username in a non-anonymous request context");
                return false;
            }
            Err(err) => {
                error!(error = %err, "failed to get username to check permissions");
                return false;
            }
        };
        if list_has_permission(&self.guest_permissions, action, scope) {
            return true;
        }
        let username = self.names.normalize(username);
        let project = self.names.normalize(project);
        self.cache.has_permission(&username, action, &project, scope)
    }

    /// Projects where the caller may perform `action` on `scope`.
    ///
    /// `["*"]` means every project. Order is unspecified.
    pub fn get_user_projects(
        &self,
        ctx: Option<&RequestContext>,
        action: Action,
        scope: Scope,
    ) -> Result<Vec<String>, AuthError> {
        if list_has_permission(&self.guest_permissions, action, scope) {
            return Ok(vec![WILDCARD_PROJECT.to_string()]);
        }
        let username = self.require_username(ctx, "list the user projects")?;
        Ok(self
            .cache
            .user_projects(&self.names.normalize(&username), action, scope))
    }

    /// Every permission of the caller, per project; guest permissions are
    /// listed under `"*"`.
    pub fn get_permissions(
        &self,
        ctx: Option<&RequestContext>,
    ) -> Result<HashMap<String, Vec<Permission>>, AuthError> {
        let username = self.require_username(ctx, "list the user permissions")?;
        Ok(self.permissions_of(&username))
    }

    /// Permissions of `username` as `get_permissions` reports them.
    ///
    /// Does not check who is asking; callers gate it.
    pub fn permissions_of(&self, username: &str) -> HashMap<String, Vec<Permission>> {
        let mut permissions = HashMap::new();
        permissions.insert(WILDCARD_PROJECT.to_string(), self.guest_permissions.clone());
        for (project, list) in self.cache.user_permissions(&self.names.normalize(username)) {
            permissions
                .entry(project)
                .or_insert_with(Vec::new)
                .extend(list);
        }
        permissions
    }

    fn require_username(&self, ctx: Option<&RequestContext>, purpose: &str) -> Result<String, AuthError> {
        let username = match ctx {
            Some(ctx) => ctx.username()?,
            None => None,
        };
        match username {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => {
                error!(purpose, "no username in the request context");
                Err(AuthError::internal("no username in the request context"))
            }
        }
    }
}
