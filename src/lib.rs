//! Storefront API Library
//!
//! Checkout, cart and stock-ledger services with an HTTP surface.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::db::DbPool;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires up the service container against a live connection.
    pub fn new(
        db: Arc<DbPool>,
        config: Arc<config::AppConfig>,
        event_sender: events::EventSender,
    ) -> Self {
        let sender = Arc::new(event_sender.clone());
        let stock_ledger = services::StockLedgerService::new(db.clone());

        let services = handlers::AppServices {
            inventory: Arc::new(services::InventoryService::new(
                db.clone(),
                sender.clone(),
                stock_ledger.clone(),
            )),
            carts: Arc::new(services::CartService::new(db.clone(), sender.clone())),
            orders: Arc::new(services::OrderService::new(
                db.clone(),
                sender.clone(),
                stock_ledger.clone(),
            )),
            checkout: Arc::new(services::CheckoutService::new(
                db.clone(),
                sender,
                config.clone(),
                stock_ledger.clone(),
            )),
            stock_ledger: Arc::new(stock_ledger),
        };

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Full v1 API surface.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(api_status))
        .nest("/carts", handlers::carts::carts_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/inventory", handlers::inventory::inventory_routes())
}

async fn api_status() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_wrapper_carries_data() {
        let response = ApiResponse::success(42);
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.message.is_none());
    }

    #[test]
    fn error_wrapper_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
