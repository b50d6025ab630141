//! Infrastructure layer: storage adapters behind the `gatekeep-auth` read traits.

pub mod store;

pub use store::{InMemoryStore, PostgresStore, StoreRead};
