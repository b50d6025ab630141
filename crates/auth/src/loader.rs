//! Compiles role and binding records into a `PermissionIndex`.

use tracing::warn;

use gatekeep_core::{StorageResult, WILDCARD_PROJECT};

use crate::cache::PermissionIndex;
use crate::roles::{Binding, GlobalRole, Role, SubjectKind};
use crate::store::PermissionSource;
use crate::user::NameCase;

/// Build the permission index of every user.
///
/// All five reads complete before anything is compiled; the first failing
/// read aborts the load and its error is returned unchanged. Bindings that
/// reference a missing role are logged and skipped.
///
/// Subject, project and role names are compared after `names` normalizes
/// them, so mixed-case references still resolve on insensitive deployments.
pub async fn load_all_permissions<S>(source: &S, names: NameCase) -> StorageResult<PermissionIndex>
where
    S: PermissionSource + ?Sized,
{
    let users = source.list_users().await?;
    let roles = source.list_roles().await?;
    let global_roles = source.list_global_roles().await?;
    let role_bindings = source.list_role_bindings().await?;
    let global_role_bindings = source.list_global_role_bindings().await?;

    let mut index = PermissionIndex::new();

    for user in &users {
        let user_name = names.normalize(&user.name);
        for binding in &global_role_bindings {
            if !binding.has_normalized(SubjectKind::User, &user_name, names) {
                continue;
            }
            let Some(role) = find_global_role(&global_roles, binding.role_name(), names) else {
                warn!(
                    role = binding.role_name(),
                    binding = binding.name(),
                    "global role listed in the global role binding does not exist"
                );
                continue;
            };
            for permission in &role.spec.permissions {
                index.add_entry(&user_name, WILDCARD_PROJECT, permission.clone());
            }
        }
    }

    for user in &users {
        let user_name = names.normalize(&user.name);
        for binding in &role_bindings {
            if !binding.has_normalized(SubjectKind::User, &user_name, names) {
                continue;
            }
            let project = names.normalize(binding.project());
            let Some(role) = find_role(&roles, &project, binding.role_name(), names) else {
                warn!(
                    role = binding.role_name(),
                    project = binding.project(),
                    binding = binding.name(),
                    "role listed in the role binding does not exist"
                );
                continue;
            };
            for permission in &role.spec.permissions {
                index.add_entry(&user_name, &project, permission.clone());
            }
        }
    }

    Ok(index)
}

fn find_global_role<'a>(roles: &'a [GlobalRole], name: &str, names: NameCase) -> Option<&'a GlobalRole> {
    let name = names.normalize(name);
    roles.iter().find(|r| names.normalize(&r.metadata.name) == name)
}

/// `project` must already be normalized.
fn find_role<'a>(roles: &'a [Role], project: &str, name: &str, names: NameCase) -> Option<&'a Role> {
    let name = names.normalize(name);
    roles.iter().find(|r| {
        names.normalize(&r.metadata.project) == project && names.normalize(&r.metadata.name) == name
    })
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use gatekeep_core::StorageError;

    use super::*;
    use crate::permissions::{Action, Permission, Scope};
    use crate::roles::{GlobalRoleBinding, RoleBinding, Subject};
    use crate::User;

    #[derive(Default)]
    struct Fixture {
        users: Vec<User>,
        roles: Vec<Role>,
        role_bindings: Vec<RoleBinding>,
        global_roles: Vec<GlobalRole>,
        global_role_bindings: Vec<GlobalRoleBinding>,
        failing_read: Option<&'static str>,
        reads: Mutex<Vec<&'static str>>,
    }

    impl Fixture {
        fn read<T: Clone>(&self, what: &'static str, rows: &[T]) -> StorageResult<Vec<T>> {
            self.reads.lock().unwrap().push(what);
            if self.failing_read == Some(what) {
                return Err(StorageError::backend(format!("{what} unavailable")));
            }
            Ok(rows.to_vec())
        }
    }

    #[async_trait]
    impl PermissionSource for Fixture {
        async fn list_users(&self) -> StorageResult<Vec<User>> {
            self.read("users", &self.users)
        }
        async fn list_roles(&self) -> StorageResult<Vec<Role>> {
            self.read("roles", &self.roles)
        }
        async fn list_role_bindings(&self) -> StorageResult<Vec<RoleBinding>> {
            self.read("role_bindings", &self.role_bindings)
        }
        async fn list_global_roles(&self) -> StorageResult<Vec<GlobalRole>> {
            self.read("global_roles", &self.global_roles)
        }
        async fn list_global_role_bindings(&self) -> StorageResult<Vec<GlobalRoleBinding>> {
            self.read("global_role_bindings", &self.global_role_bindings)
        }
    }

    /// Collects formatted log lines emitted while it is the default subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
            let logs = self.clone();
            tracing_subscriber::fmt()
                .with_writer(move || logs.clone())
                .with_ansi(false)
                .finish()
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn read_project() -> Permission {
        Permission::new([Action::Read], [Scope::Project])
    }

    #[tokio::test]
    async fn reads_every_source_once_in_order() {
        let fixture = Fixture::default();
        load_all_permissions(&fixture, NameCase::Sensitive).await.unwrap();
        assert_eq!(
            *fixture.reads.lock().unwrap(),
            vec!["users", "roles", "global_roles", "role_bindings", "global_role_bindings"]
        );
    }

    #[tokio::test]
    async fn global_bindings_land_under_the_wildcard_project() {
        let fixture = Fixture {
            users: vec![User::new(1, "alice")],
            global_roles: vec![GlobalRole::new("R", vec![Permission::new([Action::Read], [Scope::Wildcard])])],
            global_role_bindings: vec![GlobalRoleBinding::new("r-alice", "R", vec![Subject::user("alice")])],
            ..Default::default()
        };
        let index = load_all_permissions(&fixture, NameCase::Sensitive).await.unwrap();
        let alice = index.user("alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[WILDCARD_PROJECT].len(), 1);
    }

    #[tokio::test]
    async fn project_roles_resolve_within_the_binding_project() {
        let fixture = Fixture {
            users: vec![User::new(1, "bob")],
            roles: vec![
                Role::new("teamA", "viewer", vec![read_project()]),
                Role::new("teamB", "viewer", vec![Permission::new([Action::Delete], [Scope::Wildcard])]),
            ],
            role_bindings: vec![RoleBinding::new("teamA", "viewers", "viewer", vec![Subject::user("bob")])],
            ..Default::default()
        };
        let index = load_all_permissions(&fixture, NameCase::Sensitive).await.unwrap();
        assert!(index.has_permission("bob", Action::Read, "teamA", Scope::Project));
        assert!(!index.has_permission("bob", Action::Delete, "teamA", Scope::Project));
        assert!(!index.has_permission("bob", Action::Read, "teamB", Scope::Project));
    }

    #[tokio::test]
    async fn dangling_role_reference_is_skipped() {
        let fixture = Fixture {
            users: vec![User::new(1, "bob")],
            roles: vec![Role::new("teamA", "viewer", vec![read_project()])],
            role_bindings: vec![
                RoleBinding::new("teamA", "ghosts", "missing", vec![Subject::user("bob")]),
                RoleBinding::new("teamA", "viewers", "viewer", vec![Subject::user("bob")]),
            ],
            global_role_bindings: vec![GlobalRoleBinding::new("ghost", "nope", vec![Subject::user("bob")])],
            ..Default::default()
        };
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let index = load_all_permissions(&fixture, NameCase::Sensitive).await.unwrap();
        let bob = index.user("bob").unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob["teamA"], vec![read_project()]);

        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("role listed in the role binding does not exist"));
        assert!(output.contains("binding=\"ghosts\"") || output.contains("binding=ghosts"));
        assert!(output.contains("global role listed in the global role binding does not exist"));
        assert!(output.contains("role=\"nope\"") || output.contains("role=nope"));
    }

    #[tokio::test]
    async fn bindings_for_unknown_users_grant_nothing() {
        let fixture = Fixture {
            users: vec![User::new(1, "bob")],
            roles: vec![Role::new("teamA", "viewer", vec![read_project()])],
            role_bindings: vec![RoleBinding::new("teamA", "viewers", "viewer", vec![Subject::user("mallory")])],
            ..Default::default()
        };
        let index = load_all_permissions(&fixture, NameCase::Sensitive).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn any_failing_read_aborts_the_load() {
        for what in ["users", "roles", "global_roles", "role_bindings", "global_role_bindings"] {
            let fixture = Fixture {
                users: vec![User::new(1, "bob")],
                failing_read: Some(what),
                ..Default::default()
            };
            let err = load_all_permissions(&fixture, NameCase::Sensitive).await.unwrap_err();
            assert_eq!(err, StorageError::backend(format!("{what} unavailable")));
        }
    }

    #[tokio::test]
    async fn insensitive_deployments_key_by_lowercased_names() {
        let fixture = Fixture {
            users: vec![User::new(1, "Bob")],
            roles: vec![Role::new("TeamA", "viewer", vec![read_project()])],
            role_bindings: vec![RoleBinding::new("TeamA", "viewers", "viewer", vec![Subject::user("Bob")])],
            ..Default::default()
        };
        let index = load_all_permissions(&fixture, NameCase::Insensitive).await.unwrap();
        assert!(index.has_permission("bob", Action::Read, "teama", Scope::Project));
    }

    #[tokio::test]
    async fn insensitive_deployments_match_mixed_case_subjects() {
        let fixture = Fixture {
            users: vec![User::new(1, "bob")],
            roles: vec![Role::new("teamA", "viewer", vec![read_project()])],
            role_bindings: vec![RoleBinding::new("teamA", "viewers", "viewer", vec![Subject::user("Bob")])],
            global_roles: vec![GlobalRole::new("auditor", vec![Permission::new([Action::Read], [Scope::Wildcard])])],
            global_role_bindings: vec![GlobalRoleBinding::new("auditors", "auditor", vec![Subject::user("BOB")])],
            ..Default::default()
        };
        let index = load_all_permissions(&fixture, NameCase::Insensitive).await.unwrap();
        let bob = index.user("bob").unwrap();
        assert_eq!(bob.len(), 2);
        assert!(index.has_permission("bob", Action::Read, "teama", Scope::Project));
        assert!(bob.contains_key(WILDCARD_PROJECT));
    }

    #[tokio::test]
    async fn insensitive_deployments_match_mixed_case_role_references() {
        let fixture = Fixture {
            users: vec![User::new(1, "bob")],
            roles: vec![Role::new("teama", "Viewer", vec![read_project()])],
            role_bindings: vec![RoleBinding::new("TeamA", "viewers", "viewer", vec![Subject::user("bob")])],
            global_roles: vec![GlobalRole::new("Auditor", vec![Permission::new([Action::Read], [Scope::Wildcard])])],
            global_role_bindings: vec![GlobalRoleBinding::new("auditors", "auditor", vec![Subject::user("bob")])],
            ..Default::default()
        };
        let index = load_all_permissions(&fixture, NameCase::Insensitive).await.unwrap();
        let bob = index.user("bob").unwrap();
        assert_eq!(bob["teama"], vec![read_project()]);
        assert!(bob.contains_key(WILDCARD_PROJECT));
    }

    #[tokio::test]
    async fn sensitive_deployments_keep_mixed_case_names_distinct() {
        let fixture = Fixture {
            users: vec![User::new(1, "bob")],
            roles: vec![Role::new("teama", "viewer", vec![read_project()])],
            role_bindings: vec![
                RoleBinding::new("teama", "viewers", "viewer", vec![Subject::user("Bob")]),
                RoleBinding::new("TeamA", "viewers", "viewer", vec![Subject::user("bob")]),
            ],
            ..Default::default()
        };
        let index = load_all_permissions(&fixture, NameCase::Sensitive).await.unwrap();
        assert!(index.is_empty());
    }
}
