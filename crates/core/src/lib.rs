//! `gatekeep-core`: identifiers, resource kinds and the storage error model
//! shared by every layer.

pub mod error;
pub mod id;
pub mod kind;
pub mod metadata;

pub use error::{StorageError, StorageResult};
pub use id::UserId;
pub use kind::Kind;
pub use metadata::{Metadata, ProjectMetadata, WILDCARD_PROJECT};
