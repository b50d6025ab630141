//! Local user records and name handling.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatekeep_core::UserId;

/// Name prefix of an organization's system user.
///
/// `org-system-acme` acts on behalf of the organization `acme`.
pub const ORG_SYSTEM_USER_PREFIX: &str = "org-system-";

/// Whether a `users` row is a person or an organization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    User,
    Org,
}

/// A local user (or organization) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub user_type: UserType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            user_type: UserType::User,
            display_name: None,
            email: None,
            created_at: None,
        }
    }

    pub fn org(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            user_type: UserType::Org,
            ..Self::new(id, name)
        }
    }

    /// Organization name if this is an organization's system user.
    pub fn system_org_name(&self) -> Option<&str> {
        self.name
            .strip_prefix(ORG_SYSTEM_USER_PREFIX)
            .filter(|org| !org.is_empty())
    }
}

/// How the deployment compares user and project names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum NameCase {
    Sensitive,
    /// Names are lowercased before every comparison.
    #[default]
    Insensitive,
}

impl NameCase {
    pub fn from_case_sensitive(case_sensitive: bool) -> Self {
        if case_sensitive {
            NameCase::Sensitive
        } else {
            NameCase::Insensitive
        }
    }

    pub fn normalize<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            NameCase::Sensitive => Cow::Borrowed(name),
            NameCase::Insensitive if name.chars().any(char::is_uppercase) => {
                Cow::Owned(name.to_lowercase())
            }
            NameCase::Insensitive => Cow::Borrowed(name),
        }
    }
}
