//! Storage read contracts the authorization core depends on.
//!
//! Implementations live in `gatekeep-infra`; every method returns a complete
//! snapshot of the current rows or a `StorageError`.

use std::sync::Arc;

use async_trait::async_trait;

use gatekeep_core::{StorageResult, UserId};

use crate::{AccessToken, GlobalRole, GlobalRoleBinding, Role, RoleBinding, User};

/// The five relational sources the permission index is compiled from.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn list_users(&self) -> StorageResult<Vec<User>>;
    async fn list_roles(&self) -> StorageResult<Vec<Role>>;
    async fn list_role_bindings(&self) -> StorageResult<Vec<RoleBinding>>;
    async fn list_global_roles(&self) -> StorageResult<Vec<GlobalRole>>;
    async fn list_global_role_bindings(&self) -> StorageResult<Vec<GlobalRoleBinding>>;
}

/// Access-token rows, looked up by their public 8-character suffix.
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    async fn candidates_by_suffix(&self, last_eight: &str) -> StorageResult<Vec<AccessToken>>;
}

/// Single-user lookups used while resolving credentials.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_by_name(&self, name: &str) -> StorageResult<User>;
    async fn user_by_id(&self, id: UserId) -> StorageResult<User>;
    /// Organizations `name` is a member of.
    async fn organizations_of(&self, name: &str) -> StorageResult<Vec<User>>;
}

#[async_trait]
impl<S> PermissionSource for Arc<S>
where
    S: PermissionSource + ?Sized,
{
    async fn list_users(&self) -> StorageResult<Vec<User>> {
        (**self).list_users().await
    }

    async fn list_roles(&self) -> StorageResult<Vec<Role>> {
        (**self).list_roles().await
    }

    async fn list_role_bindings(&self) -> StorageResult<Vec<RoleBinding>> {
        (**self).list_role_bindings().await
    }

    async fn list_global_roles(&self) -> StorageResult<Vec<GlobalRole>> {
        (**self).list_global_roles().await
    }

    async fn list_global_role_bindings(&self) -> StorageResult<Vec<GlobalRoleBinding>> {
        (**self).list_global_role_bindings().await
    }
}

#[async_trait]
impl<S> AccessTokenStore for Arc<S>
where
    S: AccessTokenStore + ?Sized,
{
    async fn candidates_by_suffix(&self, last_eight: &str) -> StorageResult<Vec<AccessToken>> {
        (**self).candidates_by_suffix(last_eight).await
    }
}

#[async_trait]
impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    async fn user_by_name(&self, name: &str) -> StorageResult<User> {
        (**self).user_by_name(name).await
    }

    async fn user_by_id(&self, id: UserId) -> StorageResult<User> {
        (**self).user_by_id(id).await
    }

    async fn organizations_of(&self, name: &str) -> StorageResult<Vec<User>> {
        (**self).organizations_of(name).await
    }
}
