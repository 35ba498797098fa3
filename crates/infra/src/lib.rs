//! Infrastructure layer: concrete item stores.

pub mod store;


pub use store::{InMemoryItemStore, PostgresItemStore};
