pub mod carts;
pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod stock_ledger;

pub use carts::CartService;
pub use checkout::CheckoutService;
pub use inventory::InventoryService;
pub use orders::OrderService;
pub use stock_ledger::StockLedgerService;
