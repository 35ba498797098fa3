//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the shared inventory service
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the router over already-wired services.
pub fn router(services: Arc<services::AppServices>) -> Router {
    routes::router()
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}

/// Build the full HTTP router from configuration (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> Result<Router, services::ServicesError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services))
}
