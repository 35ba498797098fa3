use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockroom_core::{ItemId, StorageError};
use stockroom_inventory::{Item, ItemFields, ItemStore, NewItem, QuantityAdjustment};

/// In-memory item store for tests/dev.
///
/// Every mutation holds the write lock for its whole read-modify-write, which
/// makes `adjust_quantity` atomic. Iteration order is id order, i.e. creation
/// order for UUIDv7 ids.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    inner: RwLock<BTreeMap<ItemId, Item>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<ItemId, Item>>, StorageError> {
        self.inner
            .read()
            .map_err(|_| StorageError::Unavailable("item map lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<ItemId, Item>>, StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Unavailable("item map lock poisoned".to_string()))
    }

    fn select(&self, pred: impl Fn(&Item) -> bool) -> Result<Vec<Item>, StorageError> {
        let map = self.read()?;
        Ok(map.values().filter(|item| pred(item)).cloned().collect())
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait::async_trait]
impl ItemStore for InMemoryItemStore {
    async fn insert(&self, item: NewItem) -> Result<Item, StorageError> {
        let mut map = self.write()?;
        let mut id = ItemId::new();
        while map.contains_key(&id) {
            id = ItemId::new();
        }
        let item = item.into_item(id);
        map.insert(id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: ItemId) -> Result<Option<Item>, StorageError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn replace(
        &self,
        id: ItemId,
        fields: ItemFields,
        at: DateTime<Utc>,
    ) -> Result<Option<Item>, StorageError> {
        let mut map = self.write()?;
        let Some(item) = map.get_mut(&id) else {
            return Ok(None);
        };
        item.name = fields.name;
        item.quantity = fields.quantity;
        item.price = fields.price;
        item.category = fields.category;
        item.last_updated = item.last_updated.max(at);
        Ok(Some(item.clone()))
    }

    async fn adjust_quantity(
        &self,
        id: ItemId,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<QuantityAdjustment, StorageError> {
        let mut map = self.write()?;
        let Some(item) = map.get_mut(&id) else {
            return Ok(QuantityAdjustment::Missing);
        };
        match item.quantity.checked_add(delta) {
            Some(quantity) if quantity >= 0 => {
                item.quantity = quantity;
                item.last_updated = item.last_updated.max(at);
                Ok(QuantityAdjustment::Adjusted(item.clone()))
            }
            _ => Ok(QuantityAdjustment::Rejected {
                current: item.quantity,
            }),
        }
    }

    async fn delete(&self, id: ItemId) -> Result<bool, StorageError> {
        Ok(self.write()?.remove(&id).is_some())
    }

    async fn delete_many(&self, ids: &[ItemId]) -> Result<Vec<ItemId>, StorageError> {
        let mut map = self.write()?;
        Ok(ids
            .iter()
            .filter(|id| map.remove(*id).is_some())
            .copied()
            .collect())
    }

    async fn all(&self) -> Result<Vec<Item>, StorageError> {
        self.select(|_| true)
    }

    async fn name_contains(&self, text: &str) -> Result<Vec<Item>, StorageError> {
        self.select(|item| contains_ignore_case(&item.name, text))
    }

    async fn category_contains(&self, text: &str) -> Result<Vec<Item>, StorageError> {
        self.select(|item| contains_ignore_case(&item.category, text))
    }

    async fn price_between(&self, min: Decimal, max: Decimal) -> Result<Vec<Item>, StorageError> {
        self.select(|item| item.price >= min && item.price <= max)
    }

    async fn quantity_less_than(&self, threshold: i64) -> Result<Vec<Item>, StorageError> {
        self.select(|item| item.quantity < threshold)
    }
}
