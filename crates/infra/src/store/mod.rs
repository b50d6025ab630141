//! Storage adapters for the reads the authorization core depends on.

mod in_memory;
mod postgres;

pub use in_memory::{InMemoryStore, StoreRead};
pub use postgres::PostgresStore;
