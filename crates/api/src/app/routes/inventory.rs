use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::ItemId;

use crate::app::dto::{self, ItemDto};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/bulk", post(bulk_create))
        .route("/bulk-delete", post(bulk_delete))
        .route("/search", get(find_by_name))
        .route("/category", get(filter_by_category))
        .route("/price-range", get(filter_by_price_range))
        .route("/low-stock", get(low_stock))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/restock", post(restock_item))
}

fn parse_id(raw: &str) -> Result<ItemId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"))
}

fn item_response(status: StatusCode, item: Option<&stockroom_inventory::Item>) -> axum::response::Response {
    match ItemDto::from_item(item) {
        Some(dto) => (status, Json(dto)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    }
}

fn list_response(items: Vec<stockroom_inventory::Item>) -> axum::response::Response {
    (StatusCode::OK, Json(dto::items_to_dtos(&items))).into_response()
}

pub async fn list_items(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.inventory().list_items().await {
        Ok(items) => list_response(items),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory().get_item(id).await {
        Ok(item) => item_response(StatusCode::OK, Some(&item)),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::ItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.inventory().create_item(body.into()).await {
        Ok(item) => item_response(StatusCode::CREATED, Some(&item)),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.inventory().update_item(id, body.into()).await {
        Ok(item) => item_response(StatusCode::OK, Some(&item)),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn restock_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::RestockRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.inventory().restock_item(id, body.delta).await {
        Ok(item) => item_response(StatusCode::OK, Some(&item)),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory().delete_item(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Best-effort: always 200 with one result per submitted candidate, in order.
pub async fn bulk_create(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Vec<dto::ItemRequest>>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let candidates = body.into_iter().map(Into::into).collect();
    let results = services.inventory().bulk_create(candidates).await;
    let created = results.iter().filter(|r| r.item().is_some()).count();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "created": created,
            "failed": results.len() - created,
            "results": dto::bulk_results_to_dtos(&results),
        })),
    )
        .into_response()
}

pub async fn bulk_delete(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::BulkDeleteRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let ids = match dto::parse_ids(&body.ids) {
        Ok(ids) => ids,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.inventory().bulk_delete(&ids).await {
        Ok(deleted) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deleted": deleted })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn find_by_name(
    Extension(services): Extension<Arc<AppServices>>,
    q: Result<Query<dto::NameQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(q) = match q {
        Ok(v) => v,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    match services.inventory().find_by_name(&q.name).await {
        Ok(items) => list_response(items),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn filter_by_category(
    Extension(services): Extension<Arc<AppServices>>,
    q: Result<Query<dto::CategoryQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(q) = match q {
        Ok(v) => v,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    match services.inventory().filter_by_category(&q.category).await {
        Ok(items) => list_response(items),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn filter_by_price_range(
    Extension(services): Extension<Arc<AppServices>>,
    q: Result<Query<dto::PriceRangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(q) = match q {
        Ok(v) => v,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    match services.inventory().filter_by_price_range(q.min, q.max).await {
        Ok(items) => list_response(items),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    q: Result<Query<dto::LowStockQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(q) = match q {
        Ok(v) => v,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    match services.inventory().low_stock(q.threshold).await {
        Ok(items) => list_response(items),
        Err(e) => errors::domain_error_to_response(e),
    }
}
