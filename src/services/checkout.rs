use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::{
    cart, cart_item,
    order::{self, OrderStatus},
    order_item,
    stock_movement::MovementReason,
    Cart, CartItem, Item,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::orders::{calculate_totals, OrderWithItems};
use crate::services::stock_ledger::StockLedgerService;

/// Checkout orchestrator. Converts a cart (or an explicit item list) into an
/// order inside one transaction: availability is re-validated, stock is
/// debited through the ledger, lines are snapshotted, and on the cart path
/// the cart is cleared. Any failure rolls the whole attempt back.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
    stock_ledger: StockLedgerService,
}

/// Delivery details shared by both checkout paths.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CheckoutInput {
    #[validate(length(min = 1, max = 1000))]
    pub shipping_address: String,
    #[validate(length(min = 7, max = 32))]
    pub phone_number: String,
    pub delivery_instructions: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct DirectOrderLine {
    pub item_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct DirectOrderInput {
    #[validate]
    pub items: Vec<DirectOrderLine>,
    #[validate]
    #[serde(flatten)]
    pub delivery: CheckoutInput,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        stock_ledger: StockLedgerService,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
            stock_ledger,
        }
    }

    /// Converts the customer's cart into an order and clears the cart.
    #[instrument(skip(self, input))]
    pub async fn checkout_cart(
        &self,
        customer_id: Uuid,
        input: CheckoutInput,
    ) -> Result<OrderWithItems, ServiceError> {
        input.validate()?;

        let cart = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::EmptyCart)?;

        let txn = self.db.begin().await?;

        let lines = cart.find_related(CartItem).all(&txn).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        let requested: Vec<(Uuid, i32)> =
            lines.iter().map(|l| (l.item_id, l.quantity)).collect();

        let result = self
            .place_order(&txn, customer_id, &requested, &input)
            .await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.publish_order_events(&result, customer_id).await;
        self.event_sender
            .send_or_log(Event::CartCleared { cart_id: cart.id })
            .await;

        Ok(result)
    }

    /// Creates an order from an explicit item list, bypassing the cart.
    #[instrument(skip(self, input))]
    pub async fn create_direct_order(
        &self,
        customer_id: Uuid,
        input: DirectOrderInput,
    ) -> Result<OrderWithItems, ServiceError> {
        input.validate()?;
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for line in &input.items {
            if !seen.insert(line.item_id) {
                return Err(ServiceError::ValidationError(format!(
                    "Item {} appears more than once",
                    line.item_id
                )));
            }
        }

        let requested: Vec<(Uuid, i32)> = input
            .items
            .iter()
            .map(|l| (l.item_id, l.quantity))
            .collect();

        let txn = self.db.begin().await?;
        let result = self
            .place_order(&txn, customer_id, &requested, &input.delivery)
            .await?;
        txn.commit().await?;

        self.publish_order_events(&result, customer_id).await;
        Ok(result)
    }

    /// Shared core of both paths: validate availability, snapshot lines,
    /// debit stock, compute totals. Runs entirely on the caller's
    /// transaction.
    async fn place_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
        requested: &[(Uuid, i32)],
        delivery: &CheckoutInput,
    ) -> Result<OrderWithItems, ServiceError> {
        let mut items = Vec::with_capacity(requested.len());
        let mut unavailable = Vec::new();
        for (item_id, quantity) in requested {
            match Item::find_by_id(*item_id).one(conn).await? {
                Some(item) if item.is_available(*quantity) => items.push(item),
                Some(item) => unavailable.push(item.name),
                None => {
                    return Err(ServiceError::NotFound(format!("Item {} not found", item_id)))
                }
            }
        }
        if !unavailable.is_empty() {
            return Err(ServiceError::ItemsUnavailable(unavailable));
        }

        let priced: Vec<_> = items
            .iter()
            .zip(requested)
            .map(|(item, (_, quantity))| (item.price, *quantity))
            .collect();
        let totals = calculate_totals(
            &priced,
            self.config.default_tax_rate,
            self.config.flat_shipping_cost,
        );

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order::generate_order_number()),
            customer_id: Set(customer_id),
            status: Set(OrderStatus::Pending.as_ref().to_string()),
            subtotal: Set(totals.subtotal),
            tax_amount: Set(totals.tax_amount),
            shipping_cost: Set(totals.shipping_cost),
            total_amount: Set(totals.total_amount),
            shipping_address: Set(delivery.shipping_address.clone()),
            phone_number: Set(delivery.phone_number.clone()),
            delivery_instructions: Set(delivery.delivery_instructions.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        let mut order_items = Vec::with_capacity(items.len());
        for (item, (_, quantity)) in items.iter().zip(requested) {
            self.stock_ledger
                .debit(conn, item.id, *quantity, MovementReason::Sale)
                .await?;

            let line = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(item.id),
                item_name: Set(item.name.clone()),
                item_sku: Set(Some(item.sku.clone())),
                quantity: Set(*quantity),
                price: Set(item.price),
                created_at: Set(now),
            }
            .insert(conn)
            .await?;
            order_items.push(line);
        }

        info!(
            order_id = %order_id,
            order_number = %order.order_number,
            customer_id = %customer_id,
            total = %order.total_amount,
            "order placed"
        );

        Ok(OrderWithItems {
            order,
            items: order_items,
        })
    }

    async fn publish_order_events(&self, result: &OrderWithItems, customer_id: Uuid) {
        for line in &result.items {
            self.event_sender
                .send_or_log(Event::StockDebited {
                    item_id: line.item_id,
                    quantity: line.quantity,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: result.order.id,
                order_number: result.order.order_number.clone(),
                total_amount: result.order.total_amount,
            })
            .await;
        self.event_sender
            .send_or_log(Event::CheckoutCompleted {
                order_id: result.order.id,
                customer_id,
                item_count: result.items.len(),
            })
            .await;
    }
}
