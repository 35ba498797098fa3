//! `ItemStore` implementations.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryItemStore;
pub use postgres::PostgresItemStore;
