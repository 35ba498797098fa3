use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, ItemId};
use stockroom_inventory::{BulkCreateResult, Item, ItemCandidate};

// -------------------------
// Request DTOs
// -------------------------

/// Body of create/update. Absent fields are reported by validation, not here.
#[derive(Debug, Default, Deserialize)]
pub struct ItemRequest {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
}

impl From<ItemRequest> for ItemCandidate {
    fn from(req: ItemRequest) -> Self {
        ItemCandidate {
            name: req.name,
            quantity: req.quantity,
            price: req.price,
            category: req.category,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct PriceRangeQuery {
    pub min: Decimal,
    pub max: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: i64,
}

// -------------------------
// Response DTOs
// -------------------------

/// External view of an item: a straight copy of every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDto {
    pub id: ItemId,
    pub name: String,
    pub quantity: i64,
    pub price: Decimal,
    pub category: String,
    pub last_updated: DateTime<Utc>,
}

impl ItemDto {
    /// Pure field copy. An absent item maps to `None`, never to a zeroed DTO.
    pub fn from_item(item: Option<&Item>) -> Option<Self> {
        item.map(Self::from)
    }
}

impl From<&Item> for ItemDto {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            quantity: item.quantity,
            price: item.price,
            category: item.category.clone(),
            last_updated: item.last_updated,
        }
    }
}

pub fn items_to_dtos(items: &[Item]) -> Vec<ItemDto> {
    items.iter().map(ItemDto::from).collect()
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BulkCreateResultDto {
    Created { index: usize, item: ItemDto },
    Failed { index: usize, error: String, message: String },
}

pub fn bulk_results_to_dtos(results: &[BulkCreateResult]) -> Vec<BulkCreateResultDto> {
    results
        .iter()
        .enumerate()
        .map(|(position, r)| match r {
            BulkCreateResult::Created(item) => BulkCreateResultDto::Created {
                index: position,
                item: ItemDto::from(item),
            },
            BulkCreateResult::Failed { index, error } => BulkCreateResultDto::Failed {
                index: *index,
                error: error_code(error).to_string(),
                message: error.to_string(),
            },
        })
        .collect()
}

fn error_code(err: &DomainError) -> &'static str {
    match err {
        DomainError::Validation(_) => "validation_error",
        DomainError::NotFound(_) => "not_found",
        DomainError::InvalidId(_) => "invalid_id",
        DomainError::Storage(_) => "storage_error",
    }
}

/// Parse every id, failing on the first malformed one.
pub fn parse_ids(raw: &[String]) -> Result<Vec<ItemId>, DomainError> {
    raw.iter().map(|s| s.parse()).collect()
}
