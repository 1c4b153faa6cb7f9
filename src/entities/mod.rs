use uuid::Uuid;

pub mod cart;
pub mod cart_item;
pub mod item;
pub mod order;
pub mod order_item;
pub mod stock_movement;

pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use item::Entity as Item;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use stock_movement::Entity as StockMovement;

/// Capability for records that belong to a single customer.
///
/// Handlers and services scope reads and mutations through this instead of
/// poking at per-entity customer columns.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

impl Owned for cart::Model {
    fn owner_id(&self) -> Uuid {
        self.customer_id
    }
}

impl Owned for order::Model {
    fn owner_id(&self) -> Uuid {
        self.customer_id
    }
}
