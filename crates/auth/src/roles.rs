use serde::{Deserialize, Serialize};

use gatekeep_core::{Metadata, ProjectMetadata};

use crate::Permission;
use crate::user::NameCase;

/// Ordered list of permissions held by a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Role owned by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub metadata: ProjectMetadata,
    pub spec: RoleSpec,
}

impl Role {
    pub fn new(project: impl Into<String>, name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            metadata: ProjectMetadata::new(project, name),
            spec: RoleSpec { permissions },
        }
    }
}

/// Role that applies cluster-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRole {
    pub metadata: Metadata,
    pub spec: RoleSpec,
}

impl GlobalRole {
    pub fn new(name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            metadata: Metadata::new(name),
            spec: RoleSpec { permissions },
        }
    }
}

/// Kind of principal a binding can name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    User,
}

/// Principal named by a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.into(),
        }
    }
}

/// Role reference plus the subjects it is granted to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSpec {
    pub role: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// Assignment of a project role to subjects, inside that project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub metadata: ProjectMetadata,
    pub spec: BindingSpec,
}

impl RoleBinding {
    pub fn new(
        project: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        subjects: Vec<Subject>,
    ) -> Self {
        Self {
            metadata: ProjectMetadata::new(project, name),
            spec: BindingSpec {
                role: role.into(),
                subjects,
            },
        }
    }

    pub fn project(&self) -> &str {
        &self.metadata.project
    }
}

/// Assignment of a global role to subjects, cluster-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRoleBinding {
    pub metadata: Metadata,
    pub spec: BindingSpec,
}

impl GlobalRoleBinding {
    pub fn new(name: impl Into<String>, role: impl Into<String>, subjects: Vec<Subject>) -> Self {
        Self {
            metadata: Metadata::new(name),
            spec: BindingSpec {
                role: role.into(),
                subjects,
            },
        }
    }
}

/// Behaviour shared by project and global bindings.
pub trait Binding {
    fn name(&self) -> &str;
    fn role_name(&self) -> &str;
    fn subjects(&self) -> &[Subject];

    /// Whether `(kind, name)` is one of this binding's subjects.
    fn has(&self, kind: SubjectKind, name: &str) -> bool {
        self.subjects()
            .iter()
            .any(|s| s.kind == kind && s.name == name)
    }

    /// Like `has`, comparing subject names after normalizing them. `name`
    /// must already be normalized.
    fn has_normalized(&self, kind: SubjectKind, name: &str, names: NameCase) -> bool {
        self.subjects()
            .iter()
            .any(|s| s.kind == kind && names.normalize(&s.name) == name)
    }
}

impl Binding for RoleBinding {
    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn role_name(&self) -> &str {
        &self.spec.role
    }

    fn subjects(&self) -> &[Subject] {
        &self.spec.subjects
    }
}

impl Binding for GlobalRoleBinding {
    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn role_name(&self) -> &str {
        &self.spec.role
    }

    fn subjects(&self) -> &[Subject] {
        &self.spec.subjects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_binding_kinds_check_subjects_identically() {
        let subjects = vec![Subject::user("alice"), Subject::user("bob")];
        let project = RoleBinding::new("teamA", "viewers", "viewer", subjects.clone());
        let global = GlobalRoleBinding::new("admins", "admin", subjects);

        for binding in [&project as &dyn Binding, &global as &dyn Binding] {
            assert!(binding.has(SubjectKind::User, "alice"));
            assert!(binding.has(SubjectKind::User, "bob"));
            assert!(!binding.has(SubjectKind::User, "carol"));
        }
    }

    #[test]
    fn normalized_subject_lookup_follows_the_name_case() {
        let binding = GlobalRoleBinding::new("admins", "admin", vec![Subject::user("Bob")]);
        assert!(binding.has_normalized(SubjectKind::User, "bob", NameCase::Insensitive));
        assert!(!binding.has_normalized(SubjectKind::User, "bob", NameCase::Sensitive));
        assert!(binding.has_normalized(SubjectKind::User, "Bob", NameCase::Sensitive));
    }

    #[test]
    fn decodes_stored_binding_document() {
        let json = r#"{
            "metadata": {"name": "viewers", "project": "teamA"},
            "spec": {"role": "viewer", "subjects": [{"kind": "User", "name": "bob"}]}
        }"#;
        let binding: RoleBinding = serde_json::from_str(json).unwrap();
        assert_eq!(binding.project(), "teamA");
        assert_eq!(binding.role_name(), "viewer");
        assert!(binding.has(SubjectKind::User, "bob"));
    }
}
