//! Process-wide permission snapshot.
//!
//! The cache holds exactly one `PermissionIndex` produced by one complete
//! loader run. It is never patched in place: a refresh builds a new index off
//! lock and swaps it in under a short write lock, so readers observe either
//! the previous snapshot or the next one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;

use gatekeep_core::WILDCARD_PROJECT;

use crate::permissions::{Action, Permission, Scope, list_has_permission};

/// Permissions of one user, keyed by project name or `"*"`.
pub type ProjectPermissions = HashMap<String, Vec<Permission>>;

/// Compiled mapping user name → project (or `"*"`) → permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionIndex {
    users: HashMap<String, ProjectPermissions>,
}

impl PermissionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `permission` to the list of `(user, project)`.
    pub fn add_entry(&mut self, user: &str, project: &str, permission: Permission) {
        self.users
            .entry(user.to_string())
            .or_default()
            .entry(project.to_string())
            .or_default()
            .push(permission);
    }

    pub fn user(&self, name: &str) -> Option<&ProjectPermissions> {
        self.users.get(name)
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Number of users holding at least one permission.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Whether the user's wildcard-project list or `project` list grants
    /// `(action, scope)`.
    pub fn has_permission(&self, user: &str, action: Action, project: &str, scope: Scope) -> bool {
        let Some(projects) = self.users.get(user) else {
            return false;
        };
        let grants = |key: &str| {
            projects
                .get(key)
                .is_some_and(|perms| list_has_permission(perms, action, scope))
        };
        grants(WILDCARD_PROJECT) || grants(project)
    }

    /// Projects where `user` is granted `(action, scope)`.
    ///
    /// `["*"]` when the wildcard-project list grants it; otherwise every other
    /// project whose list grants it, in map iteration order.
    pub fn user_projects(&self, user: &str, action: Action, scope: Scope) -> Vec<String> {
        let Some(projects) = self.users.get(user) else {
            return Vec::new();
        };
        if projects
            .get(WILDCARD_PROJECT)
            .is_some_and(|perms| list_has_permission(perms, action, scope))
        {
            return vec![WILDCARD_PROJECT.to_string()];
        }
        projects
            .iter()
            .filter(|(project, perms)| {
                project.as_str() != WILDCARD_PROJECT && list_has_permission(perms.iter(), action, scope)
            })
            .map(|(project, _)| project.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("permission cache is closed")]
    Closed,

    #[error("permission cache lock poisoned")]
    Poisoned,
}

/// Observable lifecycle of the cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheStatus {
    /// Never loaded: every lookup misses.
    Empty,
    /// Serving the snapshot of the `generation`-th successful refresh.
    Loaded { generation: u64, users: usize },
    /// Shut down: refreshes are refused and every lookup misses.
    Closed,
}

#[derive(Debug)]
enum CacheState {
    Empty,
    Loaded {
        index: Arc<PermissionIndex>,
        generation: u64,
    },
    Closed,
}

/// Owned, shareable holder of the current `PermissionIndex`.
#[derive(Debug)]
pub struct PermissionCache {
    state: RwLock<CacheState>,
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionCache {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState::Empty),
        }
    }

    /// Replace the current snapshot with `index`; returns the new generation.
    pub fn install(&self, index: PermissionIndex) -> Result<u64, CacheError> {
        let index = Arc::new(index);
        let mut state = self.state.write().map_err(|_| CacheError::Poisoned)?;
        let generation = match &*state {
            CacheState::Closed => return Err(CacheError::Closed),
            CacheState::Empty => 1,
            CacheState::Loaded { generation, .. } => generation + 1,
        };
        *state = CacheState::Loaded { index, generation };
        Ok(generation)
    }

    /// Drop the snapshot and refuse further installs.
    pub fn close(&self) {
        match self.state.write() {
            Ok(mut state) => *state = CacheState::Closed,
            Err(poisoned) => *poisoned.into_inner() = CacheState::Closed,
        }
    }

    pub fn status(&self) -> CacheStatus {
        match self.state.read() {
            Ok(state) => match &*state {
                CacheState::Empty => CacheStatus::Empty,
                CacheState::Loaded { index, generation } => CacheStatus::Loaded {
                    generation: *generation,
                    users: index.len(),
                },
                CacheState::Closed => CacheStatus::Closed,
            },
            Err(_) => CacheStatus::Closed,
        }
    }

    /// The current snapshot, if one is installed.
    ///
    /// The returned `Arc` stays valid after later refreshes; it simply stops
    /// being the current one.
    pub fn snapshot(&self) -> Option<Arc<PermissionIndex>> {
        let state = self.state.read().ok()?;
        match &*state {
            CacheState::Loaded { index, .. } => Some(Arc::clone(index)),
            CacheState::Empty | CacheState::Closed => None,
        }
    }

    pub fn has_permission(&self, user: &str, action: Action, project: &str, scope: Scope) -> bool {
        self.with_index(|index| index.has_permission(user, action, project, scope))
            .unwrap_or(false)
    }

    pub fn user_projects(&self, user: &str, action: Action, scope: Scope) -> Vec<String> {
        self.with_index(|index| index.user_projects(user, action, scope))
            .unwrap_or_default()
    }

    /// Cached permissions of `user`, per project.
    pub fn user_permissions(&self, user: &str) -> ProjectPermissions {
        self.with_index(|index| index.user(user).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Run `f` against the current index while holding the read lock.
    fn with_index<T>(&self, f: impl FnOnce(&PermissionIndex) -> T) -> Option<T> {
        let state = self.state.read().ok()?;
        match &*state {
            CacheState::Loaded { index, .. } => Some(f(index)),
            CacheState::Empty | CacheState::Closed => None,
        }
    }
}
