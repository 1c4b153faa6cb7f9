use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response};
use crate::services::checkout::CheckoutInput;
use crate::AppState;

/// Cart endpoints, keyed by customer id.
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:customer_id", get(get_cart))
        .route("/:customer_id/count", get(cart_item_count))
        .route("/:customer_id/items", post(add_item))
        .route("/:customer_id/items/:item_id", put(update_item))
        .route("/:customer_id/items/:item_id", delete(remove_item))
        .route("/:customer_id/clear", post(clear_cart))
        .route("/:customer_id/checkout", post(checkout))
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    item_id: Uuid,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct UpdateItemRequest {
    quantity: i32,
}

/// Get the cart with derived totals, creating it on first access
async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state.services.carts.get_cart(customer_id).await?;
    Ok(success_response(cart))
}

/// Total units across all cart lines
async fn cart_item_count(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let count = state.services.carts.item_count(customer_id).await?;
    Ok(success_response(json!({ "count": count })))
}

/// Add an item to the cart, merging with an existing line
async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .add_item(customer_id, payload.item_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

/// Set a line's quantity; zero or less removes the line
async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((customer_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .update_item_quantity(customer_id, item_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

/// Remove a line from the cart
async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((customer_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .remove_item(customer_id, item_id)
        .await?;
    Ok(success_response(cart))
}

/// Delete every line, keeping the cart
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state.services.carts.clear_cart(customer_id).await?;
    Ok(success_response(cart))
}

/// Convert the cart into an order
async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state
        .services
        .checkout
        .checkout_cart(customer_id, payload)
        .await?;
    Ok(created_response(order))
}
