use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response, PaginationParams};
use crate::services::checkout::DirectOrderInput;
use crate::AppState;

/// Order endpoints.
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/number/:order_number", get(get_order_by_number))
        .route("/:id/status", get(get_status))
        .route("/:id/status", put(update_status))
        .route("/:id/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    customer_id: Uuid,
    #[serde(flatten)]
    order: DirectOrderInput,
}

#[derive(Debug, Deserialize)]
struct ListOrdersQuery {
    customer_id: Uuid,
    status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: OrderStatus,
}

/// Caller identity for owner-scoped routes. A mismatch reads as 404 so
/// order ids cannot be enumerated.
#[derive(Debug, Deserialize)]
struct OwnerQuery {
    customer_id: Uuid,
}

/// Create an order directly from an item list
async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state
        .services
        .checkout
        .create_direct_order(payload.customer_id, payload.order)
        .await?;
    Ok(created_response(order))
}

/// A customer's orders, newest first
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let (orders, total) = state
        .services
        .orders
        .list_orders(
            query.customer_id,
            query.status,
            pagination.page,
            pagination.per_page,
        )
        .await?;
    Ok(success_response(json!({
        "orders": orders,
        "total": total,
        "page": pagination.page,
        "per_page": pagination.per_page,
    })))
}

/// Get an order with its snapshot lines
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(owner): Query<OwnerQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_for_customer(id, owner.customer_id)
        .await?;
    Ok(success_response(order))
}

/// Get an order by its human-readable number
async fn get_order_by_number(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
    Query(owner): Query<OwnerQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_by_order_number(&order_number, owner.customer_id)
        .await?;
    Ok(success_response(order))
}

/// Current lifecycle status of an order
async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(owner): Query<OwnerQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_for_customer(id, owner.customer_id)
        .await?;
    Ok(success_response(json!({
        "order_number": order.order.order_number,
        "status": order.order.status,
    })))
}

/// Advance the order through its lifecycle
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .update_status(id, payload.status)
        .await?;
    Ok(success_response(order))
}

/// Cancel a pending or processing order owned by the caller, restoring stock
async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(owner): Query<OwnerQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .cancel_order(id, owner.customer_id)
        .await?;
    Ok(success_response(order))
}
