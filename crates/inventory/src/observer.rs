//! Operation hooks (logging/audit) injected into the service.
//!
//! The service calls `on_start` before touching the store and `on_finish`
//! with the outcome. Observers must not fail the operation.

use stockroom_core::{DomainError, StorageError};

/// The service operation being observed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Restock,
    Delete,
    BulkCreate,
    BulkDelete,
    FindByName,
    FilterByCategory,
    FilterByPriceRange,
    LowStock,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::List => "inventory.items.list",
            Operation::Get => "inventory.items.get",
            Operation::Create => "inventory.items.create",
            Operation::Update => "inventory.items.update",
            Operation::Restock => "inventory.items.restock",
            Operation::Delete => "inventory.items.delete",
            Operation::BulkCreate => "inventory.items.bulk_create",
            Operation::BulkDelete => "inventory.items.bulk_delete",
            Operation::FindByName => "inventory.items.find_by_name",
            Operation::FilterByCategory => "inventory.items.filter_by_category",
            Operation::FilterByPriceRange => "inventory.items.filter_by_price_range",
            Operation::LowStock => "inventory.items.low_stock",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an observed operation ended.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// `affected` is the number of items returned or written.
    Succeeded { affected: usize },
    Failed(&'a DomainError),
}

pub trait InventoryObserver: Send + Sync {
    fn on_start(&self, op: Operation);

    fn on_finish(&self, op: Operation, outcome: Outcome<'_>);
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl InventoryObserver for NoopObserver {
    fn on_start(&self, _op: Operation) {}

    fn on_finish(&self, _op: Operation, _outcome: Outcome<'_>) {}
}

/// Observer that writes structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl InventoryObserver for TracingObserver {
    fn on_start(&self, op: Operation) {
        tracing::debug!(operation = op.as_str(), "inventory operation started");
    }

    fn on_finish(&self, op: Operation, outcome: Outcome<'_>) {
        match outcome {
            Outcome::Succeeded { affected } => {
                tracing::info!(operation = op.as_str(), affected, "inventory operation succeeded");
            }
            Outcome::Failed(err @ (DomainError::NotFound(_) | DomainError::Validation(_) | DomainError::InvalidId(_))) => {
                tracing::warn!(operation = op.as_str(), error = %err, "inventory operation rejected");
            }
            Outcome::Failed(err @ DomainError::Storage(StorageError::Unavailable(_))) => {
                tracing::error!(operation = op.as_str(), error = %err, "inventory store unavailable");
            }
            Outcome::Failed(err) => {
                tracing::error!(operation = op.as_str(), error = %err, "inventory operation failed");
            }
        }
    }
}
