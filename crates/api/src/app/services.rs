//! Service wiring: pick a store backend and build the inventory service over it.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use stockroom_core::StorageError;
use stockroom_infra::{InMemoryItemStore, PostgresItemStore};
use stockroom_inventory::{InventoryService, ItemStore};

use crate::config::{ApiConfig, StoreBackend};

/// Store-erased service handle shared by all handlers.
pub type Inventory = InventoryService<Arc<dyn ItemStore>>;

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to connect to postgres: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("failed to prepare schema: {0}")]
    Schema(#[from] StorageError),

    #[error("DATABASE_URL must be set for the postgres store")]
    MissingDatabaseUrl,
}

pub struct AppServices {
    inventory: Inventory,
}

impl AppServices {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            inventory: InventoryService::new(store),
        }
    }

    /// Dev/test wiring over an in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryItemStore::new()))
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, ServicesError> {
    match config.store {
        StoreBackend::Memory => {
            tracing::info!("using in-memory item store");
            Ok(AppServices::in_memory())
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(ServicesError::MissingDatabaseUrl)?;
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;

            let store = PostgresItemStore::new(pool);
            store.ensure_schema().await?;
            tracing::info!(
                max_connections = config.database_max_connections,
                "using postgres item store"
            );
            Ok(AppServices::new(Arc::new(store)))
        }
    }
}
