//! `gatekeep-auth`: the authorization core.
//!
//! Verifies opaque access tokens, compiles role bindings into a per-user
//! permission index and answers permission questions from a cached snapshot
//! of it. Storage and transport stay behind the traits in [`store`].

pub mod access_token;
pub mod authorize;
pub mod cache;
pub mod loader;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod store;
pub mod user;

pub use access_token::{
    AccessToken, AccessTokenError, AccessTokenVerifier, IssuedToken, TOKEN_LOOKUP_LEN, hash_token,
    issue_token,
};
pub use authorize::{AuthError, Authorizer};
pub use cache::{CacheError, CacheStatus, PermissionCache, PermissionIndex, ProjectPermissions};
pub use loader::load_all_permissions;
pub use permissions::{Action, Permission, Scope, list_has_permission};
pub use principal::RequestContext;
pub use roles::{
    Binding, BindingSpec, GlobalRole, GlobalRoleBinding, Role, RoleBinding, RoleSpec, Subject,
    SubjectKind,
};
pub use store::{AccessTokenStore, PermissionSource, UserDirectory};
pub use user::{NameCase, ORG_SYSTEM_USER_PREFIX, User, UserType};
