use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatekeep_core::Kind;

/// Verb a permission allows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    /// Every action.
    #[serde(rename = "*")]
    Wildcard,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Wildcard => "*",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breadth at which a permission applies.
///
/// One scope per resource kind, plus `Wildcard` (`"*"`), the global scope that
/// covers every other one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Dashboard,
    Datasource,
    EphemeralDashboard,
    Folder,
    GlobalDatasource,
    GlobalRole,
    GlobalRoleBinding,
    GlobalSecret,
    GlobalVariable,
    Project,
    Role,
    RoleBinding,
    Secret,
    User,
    Variable,
    #[serde(rename = "*")]
    Wildcard,
}

impl Scope {
    pub const ALL: [Scope; 16] = [
        Scope::Dashboard,
        Scope::Datasource,
        Scope::EphemeralDashboard,
        Scope::Folder,
        Scope::GlobalDatasource,
        Scope::GlobalRole,
        Scope::GlobalRoleBinding,
        Scope::GlobalSecret,
        Scope::GlobalVariable,
        Scope::Project,
        Scope::Role,
        Scope::RoleBinding,
        Scope::Secret,
        Scope::User,
        Scope::Variable,
        Scope::Wildcard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Dashboard => "Dashboard",
            Scope::Datasource => "Datasource",
            Scope::EphemeralDashboard => "EphemeralDashboard",
            Scope::Folder => "Folder",
            Scope::GlobalDatasource => "GlobalDatasource",
            Scope::GlobalRole => "GlobalRole",
            Scope::GlobalRoleBinding => "GlobalRoleBinding",
            Scope::GlobalSecret => "GlobalSecret",
            Scope::GlobalVariable => "GlobalVariable",
            Scope::Project => "Project",
            Scope::Role => "Role",
            Scope::RoleBinding => "RoleBinding",
            Scope::Secret => "Secret",
            Scope::User => "User",
            Scope::Variable => "Variable",
            Scope::Wildcard => "*",
        }
    }

    /// Scope guarding resources of `kind`.
    ///
    /// Access tokens are managed through their owning user and have no scope
    /// of their own.
    pub fn from_kind(kind: Kind) -> Option<Scope> {
        match kind {
            Kind::AccessToken => None,
            Kind::Dashboard => Some(Scope::Dashboard),
            Kind::Datasource => Some(Scope::Datasource),
            Kind::EphemeralDashboard => Some(Scope::EphemeralDashboard),
            Kind::Folder => Some(Scope::Folder),
            Kind::GlobalDatasource => Some(Scope::GlobalDatasource),
            Kind::GlobalRole => Some(Scope::GlobalRole),
            Kind::GlobalRoleBinding => Some(Scope::GlobalRoleBinding),
            Kind::GlobalSecret => Some(Scope::GlobalSecret),
            Kind::GlobalVariable => Some(Scope::GlobalVariable),
            Kind::Project => Some(Scope::Project),
            Kind::Role => Some(Scope::Role),
            Kind::RoleBinding => Some(Scope::RoleBinding),
            Kind::Secret => Some(Scope::Secret),
            Kind::User => Some(Scope::User),
            Kind::Variable => Some(Scope::Variable),
        }
    }

    /// Scopes that only make sense cluster-wide (checked against the wildcard project).
    pub fn is_global(&self) -> bool {
        match self {
            Scope::GlobalDatasource
            | Scope::GlobalRole
            | Scope::GlobalRoleBinding
            | Scope::GlobalSecret
            | Scope::GlobalVariable
            | Scope::User
            | Scope::Wildcard => true,
            Scope::Dashboard
            | Scope::Datasource
            | Scope::EphemeralDashboard
            | Scope::Folder
            | Scope::Project
            | Scope::Role
            | Scope::RoleBinding
            | Scope::Secret
            | Scope::Variable => false,
        }
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown action '{0}'")]
    Action(String),

    #[error("unknown scope '{0}'")]
    Scope(String),
}

impl FromStr for Action {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "*" => Ok(Action::Wildcard),
            _ => Err(ParseError::Action(s.to_string())),
        }
    }
}

impl FromStr for Scope {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseError::Scope(s.to_string()))
    }
}

/// A set of actions allowed over a set of scopes.
///
/// `resources` optionally restricts the permission to named resources; it is
/// carried through the cache and returned to clients but not interpreted when
/// matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub actions: Vec<Action>,
    pub scopes: Vec<Scope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

impl Permission {
    pub fn new(actions: impl Into<Vec<Action>>, scopes: impl Into<Vec<Scope>>) -> Self {
        Self {
            actions: actions.into(),
            scopes: scopes.into(),
            resources: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this single entry allows `action` over `scope`.
    ///
    /// The action must be listed (or `*`), and the scope must be listed (or
    /// `*`) unless the requested scope is itself the wildcard scope.
    pub fn grants(&self, action: Action, scope: Scope) -> bool {
        let action_ok = self
            .actions
            .iter()
            .any(|a| *a == action || *a == Action::Wildcard);
        if !action_ok {
            return false;
        }
        scope == Scope::Wildcard
            || self
                .scopes
                .iter()
                .any(|s| *s == scope || *s == Scope::Wildcard)
    }
}

/// Whether any single entry of `permissions` allows `action` over `scope`.
pub fn list_has_permission<'a, I>(permissions: I, action: Action, scope: Scope) -> bool
where
    I: IntoIterator<Item = &'a Permission>,
{
    permissions.into_iter().any(|p| p.grants(action, scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_action_and_scope_grant_everything() {
        let admin = Permission::new([Action::Wildcard], [Scope::Wildcard]);
        for scope in Scope::ALL {
            assert!(admin.grants(Action::Delete, scope));
        }
    }

    #[test]
    fn scope_must_match_unless_requesting_wildcard() {
        let viewer = Permission::new([Action::Read], [Scope::Dashboard]);
        assert!(viewer.grants(Action::Read, Scope::Dashboard));
        assert!(!viewer.grants(Action::Read, Scope::Datasource));
        assert!(viewer.grants(Action::Read, Scope::Wildcard));
        assert!(!viewer.grants(Action::Update, Scope::Dashboard));
    }

    #[test]
    fn entries_are_not_combined() {
        // One entry has the action, the other the scope: neither satisfies both.
        let perms = vec![
            Permission::new([Action::Read], [Scope::Dashboard]),
            Permission::new([Action::Update], [Scope::Datasource]),
        ];
        assert!(!list_has_permission(&perms, Action::Update, Scope::Dashboard));
        assert!(list_has_permission(&perms, Action::Update, Scope::Datasource));
    }

    #[test]
    fn serde_matches_stored_documents() {
        let json = r#"{"actions":["read","*"],"scopes":["Dashboard","*"]}"#;
        let p: Permission = serde_json::from_str(json).unwrap();
        assert_eq!(p.actions, vec![Action::Read, Action::Wildcard]);
        assert_eq!(p.scopes, vec![Scope::Dashboard, Scope::Wildcard]);
        assert!(p.resources.is_empty());
        assert_eq!(serde_json::to_string(&p).unwrap(), json);
    }

    #[test]
    fn parses_query_spellings() {
        assert_eq!("READ".parse::<Action>().unwrap(), Action::Read);
        assert_eq!("globalsecret".parse::<Scope>().unwrap(), Scope::GlobalSecret);
        assert_eq!("*".parse::<Scope>().unwrap(), Scope::Wildcard);
        assert!("admin".parse::<Action>().is_err());
    }

    #[test]
    fn every_kind_except_tokens_has_a_scope() {
        for kind in Kind::ALL {
            let scope = Scope::from_kind(kind);
            assert_eq!(scope.is_none(), kind == Kind::AccessToken);
        }
        assert!(Scope::from_kind(Kind::GlobalRole).unwrap().is_global());
        assert!(!Scope::from_kind(Kind::Dashboard).unwrap().is_global());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn action() -> impl Strategy<Value = Action> {
            prop::sample::select(vec![
                Action::Create,
                Action::Read,
                Action::Update,
                Action::Delete,
                Action::Wildcard,
            ])
        }

        fn scope() -> impl Strategy<Value = Scope> {
            prop::sample::select(Scope::ALL.to_vec())
        }

        proptest! {
            #[test]
            fn listed_pair_is_always_granted(
                actions in prop::collection::vec(action(), 1..4),
                scopes in prop::collection::vec(scope(), 1..4),
                ai in 0usize..4,
                si in 0usize..4,
            ) {
                let action = actions[ai % actions.len()];
                let scope = scopes[si % scopes.len()];
                let p = Permission::new(actions.clone(), scopes.clone());
                prop_assert!(p.grants(action, scope));
            }

            #[test]
            fn list_grant_equals_some_entry_grant(
                entries in prop::collection::vec(
                    (prop::collection::vec(action(), 0..3), prop::collection::vec(scope(), 0..3)),
                    0..5,
                ),
                action in action(),
                scope in scope(),
            ) {
                let perms: Vec<Permission> = entries
                    .into_iter()
                    .map(|(a, s)| Permission::new(a, s))
                    .collect();
                let expected = perms.iter().any(|p| p.grants(action, scope));
                prop_assert_eq!(list_has_permission(&perms, action, scope), expected);
            }
        }
    }
}
