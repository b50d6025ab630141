//! Resource metadata shared by every stored document.

use serde::{Deserialize, Serialize};

/// Sentinel project name meaning "every project".
pub const WILDCARD_PROJECT: &str = "*";

/// Metadata of a cluster-wide resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
}

impl Metadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Metadata of a resource owned by a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub project: String,
}

impl ProjectMetadata {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
        }
    }
}
