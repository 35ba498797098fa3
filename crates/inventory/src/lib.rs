//! Inventory domain module.
//!
//! Item records, their validation rules, and the service that applies them
//! over a pluggable store. No HTTP and no concrete storage lives here.

pub mod clock;
pub mod item;
pub mod observer;
pub mod service;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use item::{Item, ItemCandidate, ItemFields, NewItem};
pub use observer::{InventoryObserver, NoopObserver, Operation, Outcome, TracingObserver};
pub use service::{BulkCreateResult, InventoryService};
pub use store::{ItemStore, QuantityAdjustment};
