use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    order::{self, OrderStatus},
    order_item,
    stock_movement::MovementReason,
    Order, OrderItem, Owned,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::stock_ledger::StockLedgerService;

/// Order lifecycle: queries, status transitions and cancellation. Order
/// creation lives in the checkout service.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    stock_ledger: StockLedgerService,
}

/// An order together with its snapshot lines.
#[derive(Clone, Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Money breakdown for a set of order lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
}

/// Computes totals from line prices. The invariant
/// `total == subtotal + tax + shipping` holds by construction.
pub fn calculate_totals(
    lines: &[(Decimal, i32)],
    tax_rate: Decimal,
    shipping_cost: Decimal,
) -> OrderTotals {
    let subtotal: Decimal = lines
        .iter()
        .map(|(price, quantity)| *price * Decimal::from(*quantity))
        .sum();
    let tax_amount = (subtotal * tax_rate).round_dp(2);
    OrderTotals {
        subtotal,
        tax_amount,
        shipping_cost,
        total_amount: subtotal + tax_amount + shipping_cost,
    }
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        stock_ledger: StockLedgerService,
    ) -> Self {
        Self {
            db,
            event_sender,
            stock_ledger,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        self.with_items(order).await
    }

    /// Fetches an order only if it belongs to the given customer. A foreign
    /// order is reported as not found rather than forbidden, so order ids
    /// cannot be enumerated.
    #[instrument(skip(self))]
    pub async fn get_order_for_customer(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let result = self.get_order(order_id).await?;
        if result.order.owner_id() != customer_id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }
        Ok(result)
    }

    /// Fetches an order by its human-readable number, owner-scoped the same
    /// way as [`get_order_for_customer`](Self::get_order_for_customer).
    #[instrument(skip(self))]
    pub async fn get_by_order_number(
        &self,
        order_number: &str,
        customer_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        if order.owner_id() != customer_id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_number
            )));
        }
        self.with_items(order).await
    }

    /// A customer's orders, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: Uuid,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status.as_ref()));
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;
        Ok((orders, total))
    }

    /// Moves an order to `next`, enforcing the lifecycle state machine.
    /// Cancellation must go through [`cancel_order`](Self::cancel_order) so
    /// stock is restored.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        if next == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidState(
                "Use the cancellation endpoint to cancel an order".to_string(),
            ));
        }

        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let current = order.status()?;

        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidState(format!(
                "Cannot move order from {} to {}",
                current, next
            )));
        }

        let mut update: order::ActiveModel = order.into();
        update.status = Set(next.as_ref().to_string());
        update.updated_at = Set(Utc::now());
        let updated = update.update(&*self.db).await?;

        info!(order_id = %order_id, from = %current, to = %next, "order status changed");
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                from: current.as_ref().to_string(),
                to: next.as_ref().to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Cancels a pending or processing order owned by `customer_id`,
    /// crediting every snapshot line back to stock in the same transaction
    /// as the status flip. A foreign order reads as not found.
    ///
    /// The flip is a conditional update with a cancellable-status guard, so
    /// of two racing cancels only one sees a row affected and credits the
    /// lines; the loser gets `InvalidState`.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.owner_id() != customer_id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        let lines = order.find_related(OrderItem).all(&*self.db).await?;
        let order_number = order.order_number.clone();

        let txn = self.db.begin().await?;

        let result = Order::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Cancelled.as_ref()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.is_in([
                OrderStatus::Pending.as_ref(),
                OrderStatus::Processing.as_ref(),
            ]))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            let current = Order::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?
                .status;
            return Err(ServiceError::InvalidState(format!(
                "Order in status {} cannot be cancelled",
                current
            )));
        }

        for line in &lines {
            self.stock_ledger
                .credit(&txn, line.item_id, line.quantity, MovementReason::OrderCancelled)
                .await?;
        }

        let cancelled = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        txn.commit().await?;

        info!(order_id = %order_id, order_number = %order_number, "order cancelled");
        for line in &lines {
            self.event_sender
                .send_or_log(Event::StockCredited {
                    item_id: line.item_id,
                    quantity: line.quantity,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderCancelled {
                order_id,
                order_number,
            })
            .await;

        Ok(cancelled)
    }

    async fn with_items(&self, order: order::Model) -> Result<OrderWithItems, ServiceError> {
        let items = order
            .find_related(OrderItem)
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(OrderWithItems { order, items })
    }
}
