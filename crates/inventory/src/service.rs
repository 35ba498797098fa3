//! Inventory record service.
//!
//! Enforces field invariants, existence checks and `last_updated` stamping
//! over an [`ItemStore`]. Holds no mutable state of its own; every call runs to
//! completion independently and all shared state lives in the store.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;

use stockroom_core::{DomainError, DomainResult, ItemId};

use crate::clock::{Clock, SystemClock};
use crate::item::{Item, ItemCandidate, NewItem};
use crate::observer::{InventoryObserver, Operation, Outcome, TracingObserver};
use crate::store::{ItemStore, QuantityAdjustment};

/// Per-candidate result of [`InventoryService::bulk_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkCreateResult {
    Created(Item),
    /// `index` is the candidate's position in the request.
    Failed { index: usize, error: DomainError },
}

impl BulkCreateResult {
    pub fn item(&self) -> Option<&Item> {
        match self {
            BulkCreateResult::Created(item) => Some(item),
            BulkCreateResult::Failed { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct InventoryService<S> {
    store: S,
    observer: Arc<dyn InventoryObserver>,
    clock: Arc<dyn Clock>,
}

impl<S> InventoryService<S>
where
    S: ItemStore,
{
    /// Service over `store`, logging through `tracing` and stamping wall-clock time.
    pub fn new(store: S) -> Self {
        Self {
            store,
            observer: Arc::new(TracingObserver),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn InventoryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// All items in storage order (creation order).
    pub async fn list_items(&self) -> DomainResult<Vec<Item>> {
        self.observer.on_start(Operation::List);
        let result = self.store.all().await.map_err(DomainError::from);
        self.finish(Operation::List, result, Vec::len)
    }

    pub async fn get_item(&self, id: ItemId) -> DomainResult<Item> {
        self.observer.on_start(Operation::Get);
        let result = self.load(id).await;
        self.finish(Operation::Get, result, |_| 1)
    }

    /// Validate, stamp and persist a new item. The store assigns the id.
    pub async fn create_item(&self, candidate: ItemCandidate) -> DomainResult<Item> {
        self.observer.on_start(Operation::Create);
        let result = self.insert(&candidate).await;
        self.finish(Operation::Create, result, |_| 1)
    }

    /// Replace name, quantity, price and category wholesale.
    ///
    /// Existence is checked before validation, so an unknown id is `NotFound`
    /// even when the candidate is also invalid.
    pub async fn update_item(&self, id: ItemId, candidate: ItemCandidate) -> DomainResult<Item> {
        self.observer.on_start(Operation::Update);
        let result = async {
            self.load(id).await?;
            let fields = candidate.validate()?;
            self.store
                .replace(id, fields, self.clock.now())
                .await?
                .ok_or(DomainError::not_found(id))
        }
        .await;
        self.finish(Operation::Update, result, |_| 1)
    }

    /// Add `delta` (positive or negative) to the stored quantity.
    ///
    /// Fails with `Validation` on `quantity` if the result would be negative;
    /// the stored item is left unchanged in that case.
    pub async fn restock_item(&self, id: ItemId, delta: i64) -> DomainResult<Item> {
        self.observer.on_start(Operation::Restock);
        let result = match self.store.adjust_quantity(id, delta, self.clock.now()).await {
            Ok(QuantityAdjustment::Adjusted(item)) => Ok(item),
            Ok(QuantityAdjustment::Missing) => Err(DomainError::not_found(id)),
            Ok(QuantityAdjustment::Rejected { current }) => Err(DomainError::invalid_field(
                "quantity",
                format!("adjusting by {delta} would leave quantity below 0 (current: {current})"),
            )),
            Err(e) => Err(e.into()),
        };
        self.finish(Operation::Restock, result, |_| 1)
    }

    pub async fn delete_item(&self, id: ItemId) -> DomainResult<()> {
        self.observer.on_start(Operation::Delete);
        let result = match self.store.delete(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DomainError::not_found(id)),
            Err(e) => Err(e.into()),
        };
        self.finish(Operation::Delete, result, |_| 1)
    }

    /// Create each candidate independently (best-effort).
    ///
    /// There is no cross-record transaction: a candidate that fails validation
    /// or storage is reported in its own slot and the rest of the batch still
    /// goes through. Results are returned in request order.
    pub async fn bulk_create(&self, candidates: Vec<ItemCandidate>) -> Vec<BulkCreateResult> {
        self.observer.on_start(Operation::BulkCreate);

        let mut results = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.iter().enumerate() {
            results.push(match self.insert(candidate).await {
                Ok(item) => BulkCreateResult::Created(item),
                Err(error) => BulkCreateResult::Failed { index, error },
            });
        }

        let created = results.iter().filter(|r| r.item().is_some()).count();
        self.observer
            .on_finish(Operation::BulkCreate, Outcome::Succeeded { affected: created });
        results
    }

    /// Delete every listed id that exists. Unknown ids are ignored, so
    /// repeating the call is harmless; the ids actually removed are returned.
    pub async fn bulk_delete(&self, ids: &[ItemId]) -> DomainResult<Vec<ItemId>> {
        self.observer.on_start(Operation::BulkDelete);

        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<ItemId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let result = if unique.is_empty() {
            Ok(Vec::new())
        } else {
            self.store.delete_many(&unique).await.map_err(DomainError::from)
        };
        self.finish(Operation::BulkDelete, result, Vec::len)
    }

    /// Case-insensitive substring search on `name`.
    pub async fn find_by_name(&self, text: &str) -> DomainResult<Vec<Item>> {
        self.observer.on_start(Operation::FindByName);
        let result = self.store.name_contains(text).await.map_err(DomainError::from);
        self.finish(Operation::FindByName, result, Vec::len)
    }

    /// Case-insensitive substring search on `category`.
    pub async fn filter_by_category(&self, text: &str) -> DomainResult<Vec<Item>> {
        self.observer.on_start(Operation::FilterByCategory);
        let result = self.store.category_contains(text).await.map_err(DomainError::from);
        self.finish(Operation::FilterByCategory, result, Vec::len)
    }

    /// Items with `min <= price <= max`.
    pub async fn filter_by_price_range(&self, min: Decimal, max: Decimal) -> DomainResult<Vec<Item>> {
        self.observer.on_start(Operation::FilterByPriceRange);
        let result = if min > max {
            Err(DomainError::invalid_field(
                "price_range",
                format!("min ({min}) must not exceed max ({max})"),
            ))
        } else {
            self.store.price_between(min, max).await.map_err(DomainError::from)
        };
        self.finish(Operation::FilterByPriceRange, result, Vec::len)
    }

    /// Items with `quantity < threshold`.
    ///
    /// Quantities are never negative, so a threshold of zero or below yields
    /// an empty list without querying the store.
    pub async fn low_stock(&self, threshold: i64) -> DomainResult<Vec<Item>> {
        self.observer.on_start(Operation::LowStock);
        let result = if threshold <= 0 {
            Ok(Vec::new())
        } else {
            self.store.quantity_less_than(threshold).await.map_err(DomainError::from)
        };
        self.finish(Operation::LowStock, result, Vec::len)
    }

    async fn load(&self, id: ItemId) -> DomainResult<Item> {
        self.store.get(id).await?.ok_or(DomainError::not_found(id))
    }

    async fn insert(&self, candidate: &ItemCandidate) -> DomainResult<Item> {
        let fields = candidate.validate()?;
        let item = NewItem {
            fields,
            last_updated: self.clock.now(),
        };
        Ok(self.store.insert(item).await?)
    }

    fn finish<T>(
        &self,
        op: Operation,
        result: DomainResult<T>,
        affected: impl FnOnce(&T) -> usize,
    ) -> DomainResult<T> {
        match &result {
            Ok(value) => self.observer.on_finish(
                op,
                Outcome::Succeeded {
                    affected: affected(value),
                },
            ),
            Err(err) => self.observer.on_finish(op, Outcome::Failed(err)),
        }
        result
    }
}
