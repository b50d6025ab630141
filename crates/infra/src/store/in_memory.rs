use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use gatekeep_auth::{
    AccessToken, AccessTokenStore, GlobalRole, GlobalRoleBinding, PermissionSource, Role,
    RoleBinding, User, UserDirectory, UserType,
};
use gatekeep_core::{StorageError, StorageResult, UserId};

/// Reads that can be made to fail on purpose.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StoreRead {
    Users,
    Roles,
    RoleBindings,
    GlobalRoles,
    GlobalRoleBindings,
    AccessTokens,
    UserLookup,
    Organizations,
}

impl StoreRead {
    fn as_str(&self) -> &'static str {
        match self {
            StoreRead::Users => "list_users",
            StoreRead::Roles => "list_roles",
            StoreRead::RoleBindings => "list_role_bindings",
            StoreRead::GlobalRoles => "list_global_roles",
            StoreRead::GlobalRoleBindings => "list_global_role_bindings",
            StoreRead::AccessTokens => "candidates_by_suffix",
            StoreRead::UserLookup => "user_lookup",
            StoreRead::Organizations => "organizations_of",
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    roles: Vec<Role>,
    role_bindings: Vec<RoleBinding>,
    global_roles: Vec<GlobalRole>,
    global_role_bindings: Vec<GlobalRoleBinding>,
    access_tokens: Vec<AccessToken>,
    /// org name -> member names
    org_members: HashMap<String, HashSet<String>>,
}

/// In-memory implementation of every storage read, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    failing: RwLock<HashSet<StoreRead>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `read` fail with a backend error.
    pub fn fail_on(&self, read: StoreRead) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(read);
        }
    }

    /// Clear every injected failure.
    pub fn heal(&self) {
        if let Ok(mut failing) = self.failing.write() {
            failing.clear();
        }
    }

    pub fn insert_user(&self, user: User) {
        self.write(|t| {
            t.users.retain(|u| u.name != user.name);
            t.users.push(user);
        });
    }

    pub fn remove_user(&self, name: &str) {
        self.write(|t| t.users.retain(|u| u.name != name));
    }

    pub fn insert_role(&self, role: Role) {
        self.write(|t| {
            t.roles.retain(|r| r.metadata != role.metadata);
            t.roles.push(role);
        });
    }

    pub fn insert_role_binding(&self, binding: RoleBinding) {
        self.write(|t| {
            t.role_bindings.retain(|b| b.metadata != binding.metadata);
            t.role_bindings.push(binding);
        });
    }

    pub fn insert_global_role(&self, role: GlobalRole) {
        self.write(|t| {
            t.global_roles.retain(|r| r.metadata != role.metadata);
            t.global_roles.push(role);
        });
    }

    pub fn insert_global_role_binding(&self, binding: GlobalRoleBinding) {
        self.write(|t| {
            t.global_role_bindings.retain(|b| b.metadata != binding.metadata);
            t.global_role_bindings.push(binding);
        });
    }

    pub fn insert_access_token(&self, token: AccessToken) {
        self.write(|t| t.access_tokens.push(token));
    }

    /// Record `member` as belonging to the organization `org`.
    pub fn add_org_member(&self, org: &str, member: &str) {
        self.write(|t| {
            t.org_members
                .entry(org.to_string())
                .or_default()
                .insert(member.to_string());
        });
    }

    fn write(&self, f: impl FnOnce(&mut Tables)) {
        if let Ok(mut tables) = self.tables.write() {
            f(&mut tables);
        }
    }

    fn read<T>(&self, read: StoreRead, f: impl FnOnce(&Tables) -> StorageResult<T>) -> StorageResult<T> {
        let failing = self
            .failing
            .read()
            .map_err(|_| StorageError::backend("lock poisoned"))?;
        if failing.contains(&read) {
            return Err(StorageError::backend(format!("{} failed", read.as_str())));
        }
        drop(failing);

        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::backend("lock poisoned"))?;
        f(&tables)
    }
}

#[async_trait]
impl PermissionSource for InMemoryStore {
    async fn list_users(&self) -> StorageResult<Vec<User>> {
        self.read(StoreRead::Users, |t| Ok(t.users.clone()))
    }

    async fn list_roles(&self) -> StorageResult<Vec<Role>> {
        self.read(StoreRead::Roles, |t| Ok(t.roles.clone()))
    }

    async fn list_role_bindings(&self) -> StorageResult<Vec<RoleBinding>> {
        self.read(StoreRead::RoleBindings, |t| Ok(t.role_bindings.clone()))
    }

    async fn list_global_roles(&self) -> StorageResult<Vec<GlobalRole>> {
        self.read(StoreRead::GlobalRoles, |t| Ok(t.global_roles.clone()))
    }

    async fn list_global_role_bindings(&self) -> StorageResult<Vec<GlobalRoleBinding>> {
        self.read(StoreRead::GlobalRoleBindings, |t| Ok(t.global_role_bindings.clone()))
    }
}

#[async_trait]
impl AccessTokenStore for InMemoryStore {
    async fn candidates_by_suffix(&self, last_eight: &str) -> StorageResult<Vec<AccessToken>> {
        self.read(StoreRead::AccessTokens, |t| {
            Ok(t.access_tokens
                .iter()
                .filter(|a| a.token_last_eight == last_eight)
                .cloned()
                .collect())
        })
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn user_by_name(&self, name: &str) -> StorageResult<User> {
        self.read(StoreRead::UserLookup, |t| {
            t.users
                .iter()
                .find(|u| u.name == name)
                .cloned()
                .ok_or_else(|| StorageError::not_found(format!("user '{name}'")))
        })
    }

    async fn user_by_id(&self, id: UserId) -> StorageResult<User> {
        self.read(StoreRead::UserLookup, |t| {
            t.users
                .iter()
                .find(|u| u.id == id)
                .cloned()
                .ok_or_else(|| StorageError::not_found(format!("user #{id}")))
        })
    }

    async fn organizations_of(&self, name: &str) -> StorageResult<Vec<User>> {
        self.read(StoreRead::Organizations, |t| {
            Ok(t.users
                .iter()
                .filter(|u| u.user_type == UserType::Org)
                .filter(|org| {
                    t.org_members
                        .get(&org.name)
                        .is_some_and(|members| members.contains(name))
                })
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeep_auth::{Action, NameCase, Permission, Scope, Subject, issue_token, load_all_permissions};

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_user(User::new(1, "alice"));
        store.insert_user(User::org(2, "acme"));
        store.insert_role(Role::new("teamA", "viewer", vec![Permission::new([Action::Read], [Scope::Project])]));
        store.insert_role_binding(RoleBinding::new("teamA", "viewers", "viewer", vec![Subject::user("alice")]));
        store.add_org_member("acme", "alice");
        store
    }

    #[tokio::test]
    async fn users_are_found_by_name_and_id() {
        let store = seeded();
        assert_eq!(store.user_by_name("alice").await.unwrap().id, UserId::new(1));
        assert_eq!(store.user_by_id(UserId::new(2)).await.unwrap().name, "acme");
        assert!(store.user_by_name("bob").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn organizations_come_from_membership_of_org_users() {
        let store = seeded();
        // Membership recorded under a non-org user is ignored.
        store.add_org_member("alice", "bob");

        let orgs = store.organizations_of("alice").await.unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].name, "acme");
        assert!(store.organizations_of("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn access_tokens_are_filtered_by_suffix() {
        let store = seeded();
        let issued = issue_token(UserId::new(1), "ci", None);
        let suffix = issued.record.token_last_eight.clone();
        store.insert_access_token(issued.record);

        assert_eq!(store.candidates_by_suffix(&suffix).await.unwrap().len(), 1);
        assert!(store.candidates_by_suffix("zzzzzzzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_surface_until_healed() {
        let store = seeded();
        store.fail_on(StoreRead::RoleBindings);

        let err = load_all_permissions(&store, NameCase::Sensitive).await.unwrap_err();
        assert_eq!(err, StorageError::backend("list_role_bindings failed"));

        store.heal();
        let index = load_all_permissions(&store, NameCase::Sensitive).await.unwrap();
        assert!(index.has_permission("alice", Action::Read, "teamA", Scope::Project));
    }

    #[test]
    fn reinserting_replaces_by_identity() {
        let store = seeded();
        store.insert_role(Role::new("teamA", "viewer", vec![]));
        let tables = store.tables.read().unwrap();
        assert_eq!(tables.roles.len(), 1);
        assert!(tables.roles[0].spec.permissions.is_empty());
    }
}
