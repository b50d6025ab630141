//! API-side authorization guard for resource operations.
//!
//! Maps a (kind, action, project, name) request onto the scope checks the
//! authorizer answers, before the operation reaches storage.

use gatekeep_auth::{Action, AuthError, Authorizer, PermissionSource, RequestContext, Scope};
use gatekeep_core::{Kind, WILDCARD_PROJECT};

fn scope_of(kind: Kind) -> Result<Scope, AuthError> {
    Scope::from_kind(kind).ok_or_else(|| AuthError::internal(format!("kind '{kind}' has no permission scope")))
}

/// Check that the caller may perform `action` on a resource of `kind`.
///
/// Global kinds are checked against the wildcard project. Projects are
/// checked against themselves (`name`), except creation which stays global.
/// Other kinds are checked in `project`.
pub fn check_permission<S: PermissionSource>(
    authorizer: &Authorizer<S>,
    ctx: &RequestContext,
    kind: Kind,
    action: Action,
    project: &str,
    name: &str,
) -> Result<(), AuthError> {
    let scope = scope_of(kind)?;

    if scope.is_global() || (scope == Scope::Project && action == Action::Create) {
        if authorizer.has_permission(Some(ctx), action, WILDCARD_PROJECT, scope) {
            return Ok(());
        }
        return Err(AuthError::forbidden(format!(
            "missing '{action}' global permission for '{scope}' kind"
        )));
    }

    let project = if scope == Scope::Project { name } else { project };
    if authorizer.has_permission(Some(ctx), action, project, scope) {
        Ok(())
    } else {
        Err(AuthError::forbidden(format!(
            "missing '{action}' permission in '{project}' project for '{scope}' kind"
        )))
    }
}

/// Check a list operation on `kind`.
///
/// Listing without a project asks for every project the caller can read and
/// is let through; results are filtered by the caller's projects instead.
pub fn check_permission_list<S: PermissionSource>(
    authorizer: &Authorizer<S>,
    ctx: &RequestContext,
    kind: Kind,
    project: &str,
    name: &str,
) -> Result<(), AuthError> {
    let scope = scope_of(kind)?;
    if scope.is_global() {
        return check_permission(authorizer, ctx, kind, Action::Read, WILDCARD_PROJECT, name);
    }
    let project = if scope == Scope::Project { name } else { project };
    if project.is_empty() {
        return Ok(());
    }
    if authorizer.has_permission(Some(ctx), Action::Read, project, scope) {
        Ok(())
    } else {
        Err(AuthError::forbidden(format!(
            "missing 'read' permission in '{project}' project for '{scope}' kind"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatekeep_auth::{
        GlobalRole, GlobalRoleBinding, NameCase, Permission, Role, RoleBinding, Subject, User,
    };
    use gatekeep_infra::InMemoryStore;

    use super::*;

    async fn authorizer() -> Authorizer<Arc<InMemoryStore>> {
        let store = Arc::new(InMemoryStore::new());
        store.insert_user(User::new(1, "alice"));
        store.insert_user(User::new(2, "root"));
        store.insert_role(Role::new(
            "shop",
            "editor",
            vec![Permission::new([Action::Read, Action::Update], [Scope::Dashboard, Scope::Project])],
        ));
        store.insert_role_binding(RoleBinding::new("shop", "editors", "editor", vec![Subject::user("alice")]));
        store.insert_global_role(GlobalRole::new("admin", vec![Permission::new([Action::Wildcard], [Scope::Wildcard])]));
        store.insert_global_role_binding(GlobalRoleBinding::new("admins", "admin", vec![Subject::user("root")]));

        let authorizer = Authorizer::new(store, Vec::new(), NameCase::Insensitive);
        authorizer.refresh_permissions().await.unwrap();
        authorizer
    }

    fn alice() -> RequestContext {
        RequestContext::authenticated(User::new(1, "alice"))
    }

    #[tokio::test]
    async fn project_scoped_kinds_check_the_project() {
        let authz = authorizer().await;
        assert!(check_permission(&authz, &alice(), Kind::Dashboard, Action::Update, "shop", "sales").is_ok());
        let err = check_permission(&authz, &alice(), Kind::Dashboard, Action::Update, "other", "sales").unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(msg) if msg.contains("'other' project")));
    }

    #[tokio::test]
    async fn projects_are_checked_against_their_own_name() {
        let authz = authorizer().await;
        assert!(check_permission(&authz, &alice(), Kind::Project, Action::Update, "", "shop").is_ok());
        assert!(check_permission(&authz, &alice(), Kind::Project, Action::Delete, "", "shop").is_err());
    }

    #[tokio::test]
    async fn project_creation_needs_a_global_grant() {
        let authz = authorizer().await;
        assert!(check_permission(&authz, &alice(), Kind::Project, Action::Create, "", "shop").is_err());
        let root = RequestContext::authenticated(User::new(2, "root"));
        assert!(check_permission(&authz, &root, Kind::Project, Action::Create, "", "new").is_ok());
    }

    #[tokio::test]
    async fn global_kinds_ignore_the_project() {
        let authz = authorizer().await;
        let err = check_permission(&authz, &alice(), Kind::GlobalRole, Action::Read, "shop", "admin").unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(msg) if msg.contains("global permission")));
    }

    #[tokio::test]
    async fn access_tokens_have_no_scope() {
        let authz = authorizer().await;
        let err = check_permission(&authz, &alice(), Kind::AccessToken, Action::Read, "", "ci").unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[tokio::test]
    async fn listing_without_a_project_is_allowed() {
        let authz = authorizer().await;
        assert!(check_permission_list(&authz, &alice(), Kind::Dashboard, "", "").is_ok());
        assert!(check_permission_list(&authz, &alice(), Kind::Dashboard, "shop", "").is_ok());
        assert!(check_permission_list(&authz, &alice(), Kind::Dashboard, "other", "").is_err());
        assert!(check_permission_list(&authz, &alice(), Kind::GlobalVariable, "", "").is_err());
    }
}
