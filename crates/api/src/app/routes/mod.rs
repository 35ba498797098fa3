use axum::{routing::get, Router};

pub mod inventory;
pub mod system;

/// Router for all item endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/items", inventory::router())
}
