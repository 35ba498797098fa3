//! Postgres-backed item store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StorageError |
//! |------------|--------------|
//! | `PoolClosed`, `PoolTimedOut`, `Io`, `Tls` | `Unavailable` |
//! | `ColumnDecode`, `ColumnNotFound`, `Decode` | `Corrupt` |
//! | anything else | `Query` |
//!
//! ## Atomic restock
//!
//! `adjust_quantity` is a single conditional `UPDATE ... RETURNING`, so the new
//! quantity is always computed from the row as it is at write time. Postgres
//! row locking serializes concurrent adjustments on the same id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::instrument;

use stockroom_core::{ItemId, StorageError};
use stockroom_inventory::{Item, ItemFields, ItemStore, NewItem, QuantityAdjustment};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory_items (
    id           UUID PRIMARY KEY,
    name         TEXT NOT NULL,
    quantity     BIGINT NOT NULL CHECK (quantity >= 0),
    price        NUMERIC NOT NULL CHECK (price >= 0),
    category     TEXT NOT NULL,
    last_updated TIMESTAMPTZ NOT NULL
)
"#;

const COLUMNS: &str = "id, name, quantity, price, category, last_updated";

/// Postgres-backed store for inventory items (`inventory_items` table).
///
/// Uses the SQLx connection pool, which is `Send + Sync`.
#[derive(Debug, Clone)]
pub struct PostgresItemStore {
    pool: Arc<PgPool>,
}

impl PostgresItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `inventory_items` table if it does not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn fetch_where(
        &self,
        operation: &str,
        sql: &str,
        bind: impl FnOnce(
            sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        ) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Item>, StorageError> {
        let rows = bind(sqlx::query(sql))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(row_to_item).collect()
    }
}

fn row_to_item(row: &PgRow) -> Result<Item, StorageError> {
    let decode = |e: sqlx::Error| StorageError::Corrupt(e.to_string());
    Ok(Item {
        id: ItemId::from_uuid(row.try_get::<uuid::Uuid, _>("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        quantity: row.try_get("quantity").map_err(decode)?,
        price: row.try_get("price").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        last_updated: row.try_get("last_updated").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StorageError::Unavailable(format!("{operation}: {err}"))
        }
        sqlx::Error::Io(e) => StorageError::Unavailable(format!("{operation}: {e}")),
        sqlx::Error::Tls(e) => StorageError::Unavailable(format!("{operation}: {e}")),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            StorageError::Corrupt(format!("{operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => {
            StorageError::Query(format!("database error in {operation}: {}", db_err.message()))
        }
        other => StorageError::Query(format!("{operation}: {other}")),
    }
}

#[async_trait::async_trait]
impl ItemStore for PostgresItemStore {
    #[instrument(skip(self, item), err)]
    async fn insert(&self, item: NewItem) -> Result<Item, StorageError> {
        let id = ItemId::new();
        let row = sqlx::query(&format!(
            "INSERT INTO inventory_items ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(&item.fields.name)
        .bind(item.fields.quantity)
        .bind(item.fields.price)
        .bind(&item.fields.category)
        .bind(item.last_updated)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;
        row_to_item(&row)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get(&self, id: ItemId) -> Result<Option<Item>, StorageError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM inventory_items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.as_ref().map(row_to_item).transpose()
    }

    #[instrument(skip(self, fields), fields(item_id = %id), err)]
    async fn replace(
        &self,
        id: ItemId,
        fields: ItemFields,
        at: DateTime<Utc>,
    ) -> Result<Option<Item>, StorageError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE inventory_items
            SET name = $2, quantity = $3, price = $4, category = $5,
                last_updated = GREATEST(last_updated, $6)
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(&fields.name)
        .bind(fields.quantity)
        .bind(fields.price)
        .bind(&fields.category)
        .bind(at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("replace", e))?;
        row.as_ref().map(row_to_item).transpose()
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn adjust_quantity(
        &self,
        id: ItemId,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<QuantityAdjustment, StorageError> {
        // NUMERIC arithmetic in the guard keeps an overflowing delta from
        // raising a bigint error; the row simply does not match.
        let row = sqlx::query(&format!(
            r#"
            UPDATE inventory_items
            SET quantity = quantity + $2,
                last_updated = GREATEST(last_updated, $3)
            WHERE id = $1
              AND quantity::numeric + $2::numeric BETWEEN 0 AND 9223372036854775807
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(delta)
        .bind(at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("adjust_quantity", e))?;

        if let Some(row) = row {
            return Ok(QuantityAdjustment::Adjusted(row_to_item(&row)?));
        }

        let current = sqlx::query("SELECT quantity FROM inventory_items WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("adjust_quantity", e))?;

        match current {
            None => Ok(QuantityAdjustment::Missing),
            Some(row) => Ok(QuantityAdjustment::Rejected {
                current: row
                    .try_get("quantity")
                    .map_err(|e| StorageError::Corrupt(e.to_string()))?,
            }),
        }
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete(&self, id: ItemId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(res.rows_affected() > 0)
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    async fn delete_many(&self, ids: &[ItemId]) -> Result<Vec<ItemId>, StorageError> {
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query("DELETE FROM inventory_items WHERE id = ANY($1) RETURNING id")
            .bind(&uuids)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_many", e))?;
        rows.iter()
            .map(|row| {
                row.try_get::<uuid::Uuid, _>("id")
                    .map(ItemId::from_uuid)
                    .map_err(|e| StorageError::Corrupt(e.to_string()))
            })
            .collect()
    }

    async fn all(&self) -> Result<Vec<Item>, StorageError> {
        self.fetch_where(
            "all",
            &format!("SELECT {COLUMNS} FROM inventory_items ORDER BY id"),
            |q| q,
        )
        .await
    }

    async fn name_contains(&self, text: &str) -> Result<Vec<Item>, StorageError> {
        let text = text.to_string();
        self.fetch_where(
            "name_contains",
            &format!(
                "SELECT {COLUMNS} FROM inventory_items WHERE strpos(lower(name), lower($1)) > 0 ORDER BY id"
            ),
            move |q| q.bind(text),
        )
        .await
    }

    async fn category_contains(&self, text: &str) -> Result<Vec<Item>, StorageError> {
        let text = text.to_string();
        self.fetch_where(
            "category_contains",
            &format!(
                "SELECT {COLUMNS} FROM inventory_items WHERE strpos(lower(category), lower($1)) > 0 ORDER BY id"
            ),
            move |q| q.bind(text),
        )
        .await
    }

    async fn price_between(&self, min: Decimal, max: Decimal) -> Result<Vec<Item>, StorageError> {
        self.fetch_where(
            "price_between",
            &format!("SELECT {COLUMNS} FROM inventory_items WHERE price BETWEEN $1 AND $2 ORDER BY id"),
            move |q| q.bind(min).bind(max),
        )
        .await
    }

    async fn quantity_less_than(&self, threshold: i64) -> Result<Vec<Item>, StorageError> {
        self.fetch_where(
            "quantity_less_than",
            &format!("SELECT {COLUMNS} FROM inventory_items WHERE quantity < $1 ORDER BY id"),
            move |q| q.bind(threshold),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_map_to_unavailable() {
        let err = map_sqlx_error("get", sqlx::Error::PoolClosed);
        assert!(matches!(err, StorageError::Unavailable(msg) if msg.starts_with("get:")));
    }

    #[test]
    fn row_not_found_maps_to_query_error() {
        let err = map_sqlx_error("insert", sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::Query(_)));
    }

    #[test]
    fn decode_errors_map_to_corrupt() {
        let err = map_sqlx_error("all", sqlx::Error::ColumnNotFound("price".to_string()));
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    mod live {
        //! Store contract against a real database. Run with
        //! `DATABASE_URL=postgres://... cargo test -p stockroom-infra -- --ignored`.
        //!
        //! Tests share one table, so each one tags its rows with a fresh token
        //! and only asserts on rows carrying it.

        use super::*;
        use chrono::{Duration, TimeZone};
        use rust_decimal_macros::dec;
        use sqlx::postgres::PgPoolOptions;

        async fn store() -> PostgresItemStore {
            let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await
                .expect("failed to connect to postgres");
            let store = PostgresItemStore::new(pool);
            store.ensure_schema().await.unwrap();
            store
        }

        fn token() -> String {
            format!("t{}", ItemId::new().as_uuid().simple())
        }

        fn t0() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        }

        fn new_item(name: &str, quantity: i64, price: Decimal, category: &str) -> NewItem {
            NewItem {
                fields: ItemFields {
                    name: name.to_string(),
                    quantity,
                    price,
                    category: category.to_string(),
                },
                last_updated: t0(),
            }
        }

        fn tagged(items: Vec<Item>, tag: &str) -> Vec<Item> {
            items
                .into_iter()
                .filter(|i| i.name.contains(tag) || i.category.contains(tag))
                .collect()
        }

        #[tokio::test]
        #[ignore = "requires a running Postgres (DATABASE_URL)"]
        async fn insert_then_get_returns_equal_item() {
            let store = store().await;
            let tag = token();
            let item = store
                .insert(new_item(&tag, 3, dec!(1234567.123456789012), "x"))
                .await
                .unwrap();

            assert_eq!(item.price, dec!(1234567.123456789012));
            assert_eq!(store.get(item.id).await.unwrap(), Some(item));
            assert_eq!(store.get(ItemId::new()).await.unwrap(), None);
        }

        #[tokio::test]
        #[ignore = "requires a running Postgres (DATABASE_URL)"]
        async fn adjustment_distinguishes_missing_from_rejected() {
            let store = store().await;
            let item = store.insert(new_item(&token(), 2, dec!(1), "x")).await.unwrap();

            let outcome = store.adjust_quantity(item.id, 3, t0()).await.unwrap();
            assert!(matches!(outcome, QuantityAdjustment::Adjusted(ref i) if i.quantity == 5));

            let outcome = store.adjust_quantity(item.id, -6, t0()).await.unwrap();
            assert_eq!(outcome, QuantityAdjustment::Rejected { current: 5 });
            assert_eq!(store.get(item.id).await.unwrap().unwrap().quantity, 5);

            let outcome = store.adjust_quantity(ItemId::new(), 1, t0()).await.unwrap();
            assert_eq!(outcome, QuantityAdjustment::Missing);
        }

        #[tokio::test]
        #[ignore = "requires a running Postgres (DATABASE_URL)"]
        async fn overflowing_adjustment_is_rejected() {
            let store = store().await;
            let item = store
                .insert(new_item(&token(), i64::MAX, dec!(1), "x"))
                .await
                .unwrap();

            let outcome = store.adjust_quantity(item.id, 1, t0()).await.unwrap();
            assert_eq!(outcome, QuantityAdjustment::Rejected { current: i64::MAX });
        }

        #[tokio::test]
        #[ignore = "requires a running Postgres (DATABASE_URL)"]
        async fn last_updated_never_moves_backwards() {
            let store = store().await;
            let item = store.insert(new_item(&token(), 2, dec!(1), "x")).await.unwrap();
            let earlier = t0() - Duration::seconds(30);
            let later = t0() + Duration::seconds(30);

            let QuantityAdjustment::Adjusted(adjusted) =
                store.adjust_quantity(item.id, 1, earlier).await.unwrap()
            else {
                panic!("expected adjustment to succeed");
            };
            assert_eq!(adjusted.last_updated, t0());

            let replaced = store
                .replace(item.id, item.fields(), earlier)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(replaced.last_updated, t0());

            let replaced = store
                .replace(item.id, item.fields(), later)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(replaced.last_updated, later);

            assert_eq!(store.replace(ItemId::new(), item.fields(), later).await.unwrap(), None);
        }

        #[tokio::test]
        #[ignore = "requires a running Postgres (DATABASE_URL)"]
        async fn substring_queries_ignore_case_and_treat_wildcards_literally() {
            let store = store().await;
            let tag = token();
            store
                .insert(new_item(&format!("Red Widget {tag}"), 1, dec!(1), &format!("Tools {tag}")))
                .await
                .unwrap();
            store
                .insert(new_item(&format!("blue gadget {tag}"), 1, dec!(1), &format!("toys {tag}")))
                .await
                .unwrap();

            let by_name = store
                .name_contains(&format!("WIDGET {}", tag.to_uppercase()))
                .await
                .unwrap();
            assert_eq!(by_name.len(), 1);
            assert!(by_name[0].name.starts_with("Red Widget"));

            let by_category = store
                .category_contains(&format!("TOYS {}", tag.to_uppercase()))
                .await
                .unwrap();
            assert_eq!(by_category.len(), 1);
            assert!(by_category[0].name.starts_with("blue gadget"));

            let wildcard = store.name_contains(&format!("%{tag}")).await.unwrap();
            assert!(wildcard.is_empty());
        }

        #[tokio::test]
        #[ignore = "requires a running Postgres (DATABASE_URL)"]
        async fn range_queries_are_exact() {
            let store = store().await;
            let tag = token();
            for (quantity, price) in [(0, dec!(1.00)), (5, dec!(2.50)), (10, dec!(5.00)), (20, dec!(5.01))] {
                store.insert(new_item(&tag, quantity, price, "x")).await.unwrap();
            }

            let hits = tagged(store.price_between(dec!(1), dec!(5)).await.unwrap(), &tag);
            let mut prices: Vec<Decimal> = hits.iter().map(|i| i.price).collect();
            prices.sort();
            assert_eq!(prices, vec![dec!(1.00), dec!(2.50), dec!(5.00)]);

            let low = tagged(store.quantity_less_than(5).await.unwrap(), &tag);
            assert_eq!(low.len(), 1);
            assert_eq!(low[0].quantity, 0);
        }

        #[tokio::test]
        #[ignore = "requires a running Postgres (DATABASE_URL)"]
        async fn delete_many_reports_only_removed_ids() {
            let store = store().await;
            let tag = token();
            let a = store.insert(new_item(&tag, 1, dec!(1), "x")).await.unwrap();
            let b = store.insert(new_item(&tag, 1, dec!(1), "x")).await.unwrap();
            let ghost = ItemId::new();

            let mut removed = store.delete_many(&[a.id, ghost, b.id]).await.unwrap();
            removed.sort();
            let mut expected = vec![a.id, b.id];
            expected.sort();
            assert_eq!(removed, expected);

            assert!(store.delete_many(&[a.id, b.id]).await.unwrap().is_empty());
            assert!(tagged(store.all().await.unwrap(), &tag).is_empty());
            assert!(!store.delete(a.id).await.unwrap());
        }

        #[tokio::test]
        #[ignore = "requires a running Postgres (DATABASE_URL)"]
        async fn concurrent_adjustments_do_not_lose_updates() {
            let store = store().await;
            let id = store.insert(new_item(&token(), 0, dec!(1), "x")).await.unwrap().id;

            let mut handles = Vec::new();
            for _ in 0..20 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    store.adjust_quantity(id, 2, Utc::now()).await.unwrap()
                }));
            }
            for h in handles {
                h.await.unwrap();
            }

            assert_eq!(store.get(id).await.unwrap().unwrap().quantity, 40);
        }
    }
}
