use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response};
use crate::services::inventory::{CreateItemInput, ItemListFilter, UpdateItemInput};
use crate::AppState;

/// Catalog and stock administration endpoints.
pub fn inventory_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", post(create_item))
        .route("/items", get(list_items))
        .route("/items/:id", get(get_item))
        .route("/items/:id", put(update_item))
        .route("/items/:id/restock", post(restock_item))
        .route("/items/:id/adjust", post(adjust_item))
        .route("/items/:id/movements", get(item_movements))
        .route("/items/:id/reconciliation", get(item_reconciliation))
}

#[derive(Debug, Deserialize)]
struct RestockRequest {
    quantity: i32,
}

/// Create a catalog item
async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateItemInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let item = state.services.inventory.create_item(payload).await?;
    Ok(created_response(item))
}

/// List catalog items with optional filters
async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ItemListFilter>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let (items, total) = state.services.inventory.list_items(filter).await?;
    Ok(success_response(json!({
        "items": items,
        "total": total,
    })))
}

/// Get a single item
async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let item = state.services.inventory.get_item(id).await?;
    Ok(success_response(item))
}

/// Update item details
async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let item = state.services.inventory.update_item(id, payload).await?;
    Ok(success_response(item))
}

/// Add stock through the ledger
async fn restock_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RestockRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let item = state
        .services
        .inventory
        .restock(id, payload.quantity)
        .await?;
    Ok(success_response(item))
}

#[derive(Debug, Deserialize)]
struct AdjustRequest {
    quantity_change: i32,
}

/// Correct the stock count, logging an adjustment movement
async fn adjust_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let item = state
        .services
        .inventory
        .adjust_stock(id, payload.quantity_change)
        .await?;
    Ok(success_response(item))
}

/// Movement history, newest first
async fn item_movements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let movements = state.services.inventory.movement_history(id).await?;
    Ok(success_response(movements))
}

/// Check the counter against the movement log
async fn item_reconciliation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let report = state.services.stock_ledger.reconcile(id).await?;
    Ok(success_response(report))
}
