use std::sync::Arc;

pub mod carts;
pub mod common;
pub mod inventory;
pub mod orders;

/// Service container handed to the handlers through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<crate::services::InventoryService>,
    pub carts: Arc<crate::services::CartService>,
    pub orders: Arc<crate::services::OrderService>,
    pub checkout: Arc<crate::services::CheckoutService>,
    pub stock_ledger: Arc<crate::services::StockLedgerService>,
}
