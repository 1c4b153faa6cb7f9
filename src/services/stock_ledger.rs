use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{item, stock_movement, stock_movement::MovementReason, Item, StockMovement};
use crate::errors::ServiceError;

/// Stock ledger: the only code path allowed to change `items.quantity`.
///
/// Every change goes through [`debit`](StockLedgerService::debit) or
/// [`credit`](StockLedgerService::credit), which adjust the on-hand count and
/// append an immutable movement row in the same connection (callers pass
/// their open transaction). The movement log therefore always reconciles
/// with the counter.
#[derive(Clone)]
pub struct StockLedgerService {
    db: Arc<DbPool>,
}

/// Result of checking an item's counter against its movement log.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Reconciliation {
    pub item_id: Uuid,
    pub quantity: i32,
    pub movement_sum: i64,
    pub consistent: bool,
}

impl StockLedgerService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Removes `quantity` units from stock with a single conditional update.
    ///
    /// The `quantity >= n` guard in the WHERE clause makes the decrement a
    /// compare-and-swap: under concurrent checkouts the database serializes
    /// the updates and the loser sees zero rows affected, never a negative
    /// count.
    #[instrument(skip(self, conn))]
    pub async fn debit<C: ConnectionTrait>(
        &self,
        conn: &C,
        item_id: Uuid,
        quantity: i32,
        reason: MovementReason,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Debit quantity must be positive".to_string(),
            ));
        }

        let result = Item::update_many()
            .col_expr(
                item::Column::Quantity,
                Expr::col(item::Column::Quantity).sub(quantity),
            )
            .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(item::Column::Id.eq(item_id))
            .filter(item::Column::Quantity.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let item = Item::find_by_id(item_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of {} available, {} requested",
                item.quantity, item.name, quantity
            )));
        }

        self.record_movement(conn, item_id, -quantity, reason).await
    }

    /// Returns `quantity` units to stock and appends the matching movement.
    #[instrument(skip(self, conn))]
    pub async fn credit<C: ConnectionTrait>(
        &self,
        conn: &C,
        item_id: Uuid,
        quantity: i32,
        reason: MovementReason,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Credit quantity must be positive".to_string(),
            ));
        }

        let result = Item::update_many()
            .col_expr(
                item::Column::Quantity,
                Expr::col(item::Column::Quantity).add(quantity),
            )
            .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(item::Column::Id.eq(item_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Item {} not found", item_id)));
        }

        self.record_movement(conn, item_id, quantity, reason).await
    }

    /// Logs the opening balance for a freshly inserted item. The row itself
    /// already carries the quantity, so only the movement is written.
    pub async fn record_initial_stock<C: ConnectionTrait>(
        &self,
        conn: &C,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Initial stock must be positive".to_string(),
            ));
        }
        self.record_movement(conn, item_id, quantity, MovementReason::InitialStock)
            .await
    }

    async fn record_movement<C: ConnectionTrait>(
        &self,
        conn: &C,
        item_id: Uuid,
        quantity_change: i32,
        reason: MovementReason,
    ) -> Result<(), ServiceError> {
        stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item_id),
            quantity_change: Set(quantity_change),
            reason: Set(reason.as_ref().to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;
        Ok(())
    }

    /// Movement history for an item, newest first.
    #[instrument(skip(self))]
    pub async fn movements_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        Item::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let movements = StockMovement::find()
            .filter(stock_movement::Column::ItemId.eq(item_id))
            .order_by_desc(stock_movement::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(movements)
    }

    /// Checks that the on-hand counter equals the sum of the movement log.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, item_id: Uuid) -> Result<Reconciliation, ServiceError> {
        let item = Item::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let movements = StockMovement::find()
            .filter(stock_movement::Column::ItemId.eq(item_id))
            .all(&*self.db)
            .await?;
        let movement_sum: i64 = movements.iter().map(|m| m.quantity_change as i64).sum();

        Ok(Reconciliation {
            item_id,
            quantity: item.quantity,
            movement_sum,
            consistent: movement_sum == item.quantity as i64,
        })
    }
}
