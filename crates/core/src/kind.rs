//! Resource kinds managed by the API.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Every resource kind the API knows about.
///
/// This is a closed set: code that branches on a kind matches exhaustively so
/// that adding a kind fails to compile until every mapping handles it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    AccessToken,
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
}

impl Kind {
    pub const ALL: [Kind; 16] = [
        Kind::AccessToken,
        Kind::Dashboard,
        Kind::Datasource,
        Kind::EphemeralDashboard,
        Kind::Folder,
        Kind::GlobalDatasource,
        Kind::GlobalRole,
        Kind::GlobalRoleBinding,
        Kind::GlobalSecret,
        Kind::GlobalVariable,
        Kind::Project,
        Kind::Role,
        Kind::RoleBinding,
        Kind::Secret,
        Kind::User,
        Kind::Variable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::AccessToken => "AccessToken",
            Kind::Dashboard => "Dashboard",
            Kind::Datasource => "Datasource",
            Kind::EphemeralDashboard => "EphemeralDashboard",
            Kind::Folder => "Folder",
            Kind::GlobalDatasource => "GlobalDatasource",
            Kind::GlobalRole => "GlobalRole",
            Kind::GlobalRoleBinding => "GlobalRoleBinding",
            Kind::GlobalSecret => "GlobalSecret",
            Kind::GlobalVariable => "GlobalVariable",
            Kind::Project => "Project",
            Kind::Role => "Role",
            Kind::RoleBinding => "RoleBinding",
            Kind::Secret => "Secret",
            Kind::User => "User",
            Kind::Variable => "Variable",
        }
    }

    /// Name of the relational table holding documents of this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            Kind::AccessToken => "access_token",
            Kind::Dashboard => "dashboard",
            Kind::Datasource => "datasource",
            Kind::EphemeralDashboard => "ephemeraldashboard",
            Kind::Folder => "folder",
            Kind::GlobalDatasource => "globaldatasource",
            Kind::GlobalRole => "globalrole",
            Kind::GlobalRoleBinding => "globalrolebinding",
            Kind::GlobalSecret => "globalsecret",
            Kind::GlobalVariable => "globalvariable",
            Kind::Project => "project",
            Kind::Role => "role",
            Kind::RoleBinding => "rolebinding",
            Kind::Secret => "secret",
            Kind::User => "users",
            Kind::Variable => "variable",
        }
    }

    /// Whether documents of this kind live inside a project.
    pub fn is_project_scoped(&self) -> bool {
        match self {
            Kind::Dashboard
            | Kind::Datasource
            | Kind::EphemeralDashboard
            | Kind::Folder
            | Kind::Role
            | Kind::RoleBinding
            | Kind::Secret
            | Kind::Variable => true,
            Kind::AccessToken
            | Kind::GlobalDatasource
            | Kind::GlobalRole
            | Kind::GlobalRoleBinding
            | Kind::GlobalSecret
            | Kind::GlobalVariable
            | Kind::Project
            | Kind::User => false,
        }
    }
}

impl core::fmt::Display for Kind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    /// Case-insensitive, so route segments like `globalroles` map as well as
    /// document `kind` fields.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = wanted.strip_suffix('s').unwrap_or(&wanted);
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_and_route_spellings() {
        assert_eq!("GlobalRole".parse::<Kind>().unwrap(), Kind::GlobalRole);
        assert_eq!("globalroles".parse::<Kind>().unwrap(), Kind::GlobalRole);
        assert_eq!("dashboards".parse::<Kind>().unwrap(), Kind::Dashboard);
        assert!("widget".parse::<Kind>().is_err());
    }

    #[test]
    fn user_documents_live_in_users_table() {
        assert_eq!(Kind::User.table_name(), "users");
        assert!(!Kind::User.is_project_scoped());
        assert!(Kind::RoleBinding.is_project_scoped());
    }

    #[test]
    fn serde_uses_kind_names() {
        let json = serde_json::to_string(&Kind::GlobalRoleBinding).unwrap();
        assert_eq!(json, "\"GlobalRoleBinding\"");
    }
}
