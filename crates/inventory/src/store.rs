//! Storage contract consumed by the inventory service.
//!
//! Implementations own durability and concurrent-access safety. The service
//! only relies on the guarantees documented per method.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockroom_core::{ItemId, StorageError};

use crate::item::{Item, ItemFields, NewItem};

/// Result of an atomic quantity adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityAdjustment {
    /// The new quantity was persisted.
    Adjusted(Item),
    /// No item with that id.
    Missing,
    /// The adjustment would leave the quantity negative (or overflow); nothing was written.
    Rejected { current: i64 },
}

/// Durable keyed item store with predicate queries.
#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    /// Persist a new record, assigning its id.
    async fn insert(&self, item: NewItem) -> Result<Item, StorageError>;

    async fn get(&self, id: ItemId) -> Result<Option<Item>, StorageError>;

    /// Replace the editable fields wholesale.
    ///
    /// `last_updated` becomes `max(stored, at)`. Returns `None` if the id is absent.
    async fn replace(
        &self,
        id: ItemId,
        fields: ItemFields,
        at: DateTime<Utc>,
    ) -> Result<Option<Item>, StorageError>;

    /// Add `delta` to the stored quantity as one read-modify-write.
    ///
    /// The new quantity is computed from the latest persisted value, so two
    /// concurrent adjustments on the same id never lose an update.
    /// `last_updated` becomes `max(stored, at)` on success.
    async fn adjust_quantity(
        &self,
        id: ItemId,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<QuantityAdjustment, StorageError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: ItemId) -> Result<bool, StorageError>;

    /// Remove every listed id that exists; returns the ids actually removed.
    async fn delete_many(&self, ids: &[ItemId]) -> Result<Vec<ItemId>, StorageError>;

    /// All records, ordered by id.
    async fn all(&self) -> Result<Vec<Item>, StorageError>;

    /// Case-insensitive substring match on `name`.
    async fn name_contains(&self, text: &str) -> Result<Vec<Item>, StorageError>;

    /// Case-insensitive substring match on `category`.
    async fn category_contains(&self, text: &str) -> Result<Vec<Item>, StorageError>;

    /// Inclusive `min <= price <= max`.
    async fn price_between(&self, min: Decimal, max: Decimal) -> Result<Vec<Item>, StorageError>;

    async fn quantity_less_than(&self, threshold: i64) -> Result<Vec<Item>, StorageError>;
}

#[async_trait::async_trait]
impl<S> ItemStore for Arc<S>
where
    S: ItemStore + ?Sized,
{
    async fn insert(&self, item: NewItem) -> Result<Item, StorageError> {
        (**self).insert(item).await
    }

    async fn get(&self, id: ItemId) -> Result<Option<Item>, StorageError> {
        (**self).get(id).await
    }

    async fn replace(
        &self,
        id: ItemId,
        fields: ItemFields,
        at: DateTime<Utc>,
    ) -> Result<Option<Item>, StorageError> {
        (**self).replace(id, fields, at).await
    }

    async fn adjust_quantity(
        &self,
        id: ItemId,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<QuantityAdjustment, StorageError> {
        (**self).adjust_quantity(id, delta, at).await
    }

    async fn delete(&self, id: ItemId) -> Result<bool, StorageError> {
        (**self).delete(id).await
    }

    async fn delete_many(&self, ids: &[ItemId]) -> Result<Vec<ItemId>, StorageError> {
        (**self).delete_many(ids).await
    }

    async fn all(&self) -> Result<Vec<Item>, StorageError> {
        (**self).all().await
    }

    async fn name_contains(&self, text: &str) -> Result<Vec<Item>, StorageError> {
        (**self).name_contains(text).await
    }

    async fn category_contains(&self, text: &str) -> Result<Vec<Item>, StorageError> {
        (**self).category_contains(text).await
    }

    async fn price_between(&self, min: Decimal, max: Decimal) -> Result<Vec<Item>, StorageError> {
        (**self).price_between(min, max).await
    }

    async fn quantity_less_than(&self, threshold: i64) -> Result<Vec<Item>, StorageError> {
        (**self).quantity_less_than(threshold).await
    }
}
