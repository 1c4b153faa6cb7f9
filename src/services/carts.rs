use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{cart, cart_item, Cart, CartItem, Item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Shopping cart service. One cart per customer, created lazily; lines are
/// unique per item and adding an item already in the cart increments the
/// existing line.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

/// A cart line joined with its catalog item.
#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub item_name: String,
    pub item_sku: String,
    pub price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub in_stock: bool,
}

/// Cart contents with derived totals.
#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    pub cart_id: Uuid,
    pub customer_id: Uuid,
    pub lines: Vec<CartLine>,
    pub total_items: i32,
    pub total_price: Decimal,
    pub is_empty: bool,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Finds the customer's cart, creating it on first access.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, customer_id: Uuid) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let insert = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await;

        match insert {
            Ok(created) => {
                info!(customer_id = %customer_id, cart_id = %created.id, "cart created");
                Ok(created)
            }
            // Lost the race on the unique customer index; the winner's cart
            // is the one we want.
            Err(_) => Cart::find()
                .filter(cart::Column::CustomerId.eq(customer_id))
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "cart for customer {} could not be created",
                        customer_id
                    ))
                }),
        }
    }

    /// Adds an item to the cart, incrementing the existing line if present.
    /// The combined quantity must be coverable by current stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let cart = self.get_or_create_cart(customer_id).await?;
        let item = Item::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ItemId.eq(item_id))
            .one(&*self.db)
            .await?;

        let requested = existing
            .as_ref()
            .map_or(Some(quantity), |line| line.quantity.checked_add(quantity))
            .ok_or_else(|| {
                ServiceError::ValidationError("Quantity is too large".to_string())
            })?;
        if !item.is_available(requested) {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of {} available, {} requested",
                item.quantity, item.name, requested
            )));
        }

        let now = Utc::now();
        match existing {
            Some(line) => {
                let mut update: cart_item::ActiveModel = line.into();
                update.quantity = Set(requested);
                update.updated_at = Set(now);
                update.update(&*self.db).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    item_id: Set(item_id),
                    quantity: Set(quantity),
                    added_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?;
            }
        }
        self.touch_cart(&cart).await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                item_id,
                quantity,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Sets a line's quantity. Zero or negative removes the line.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return self.remove_item(customer_id, item_id).await;
        }

        let cart = self.find_cart(customer_id).await?;
        let line = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ItemId.eq(item_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Item {} is not in the cart", item_id))
            })?;

        let item = Item::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;
        if !item.is_available(quantity) {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of {} available, {} requested",
                item.quantity, item.name, quantity
            )));
        }

        let mut update: cart_item::ActiveModel = line.into();
        update.quantity = Set(quantity);
        update.updated_at = Set(Utc::now());
        update.update(&*self.db).await?;
        self.touch_cart(&cart).await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
                quantity,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Removes a line from the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let cart = self.find_cart(customer_id).await?;
        let line = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ItemId.eq(item_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Item {} is not in the cart", item_id))
            })?;

        line.delete(&*self.db).await?;
        self.touch_cart(&cart).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Deletes every line, keeping the cart row itself. Idempotent; a
    /// customer who has never touched their cart just gets an empty one.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;
        self.touch_cart(&cart).await?;

        self.event_sender
            .send_or_log(Event::CartCleared { cart_id: cart.id })
            .await;

        self.get_cart(customer_id).await
    }

    /// Cart contents with totals derived from the current catalog prices.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;
        let lines = self.load_lines(&cart).await?;

        let total_items = lines.iter().map(|l| l.quantity).sum();
        let total_price = lines.iter().map(|l| l.line_total).sum();

        Ok(CartView {
            cart_id: cart.id,
            customer_id: cart.customer_id,
            is_empty: lines.is_empty(),
            lines,
            total_items,
            total_price,
        })
    }

    /// Number of units across all lines.
    pub async fn item_count(&self, customer_id: Uuid) -> Result<i32, ServiceError> {
        Ok(self.get_cart(customer_id).await?.total_items)
    }

    async fn find_cart(&self, customer_id: Uuid) -> Result<cart::Model, ServiceError> {
        Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Cart for customer {} not found", customer_id))
            })
    }

    async fn load_lines(&self, cart: &cart::Model) -> Result<Vec<CartLine>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::AddedAt)
            .find_also_related(Item)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (line, item) in rows {
            let item = item.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "cart line {} references missing item {}",
                    line.id, line.item_id
                ))
            })?;
            lines.push(CartLine {
                item_id: item.id,
                item_name: item.name.clone(),
                item_sku: item.sku.clone(),
                price: item.price,
                line_total: item.price * Decimal::from(line.quantity),
                quantity: line.quantity,
                in_stock: item.is_available(line.quantity),
            });
        }
        Ok(lines)
    }

    async fn touch_cart(&self, cart: &cart::Model) -> Result<(), ServiceError> {
        let mut update: cart::ActiveModel = cart.clone().into();
        update.updated_at = Set(Utc::now());
        update.update(&*self.db).await?;
        Ok(())
    }
}
