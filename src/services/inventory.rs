use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{item, stock_movement::MovementReason, Item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::stock_ledger::StockLedgerService;

/// Catalog and stock administration: item CRUD, restocking and movement
/// history. All quantity changes are delegated to the stock ledger.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    stock_ledger: StockLedgerService,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    /// Generated as `ITEM-XXXXXXXX` when omitted.
    pub sku: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub quantity: i32,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ItemListFilter {
    pub is_active: Option<bool>,
    #[serde(default)]
    pub in_stock_only: bool,
    /// Keep only items at or below this quantity.
    pub low_stock_threshold: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Generates a fresh catalog SKU.
pub fn generate_sku() -> String {
    format!(
        "ITEM-{}",
        Uuid::new_v4().simple().to_string()[..8].to_uppercase()
    )
}

impl InventoryService {
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

    /// Creates a catalog item. A non-zero opening quantity is recorded in the
    /// ledger as an `initial_stock` movement so the log reconciles from day
    /// one.
    #[instrument(skip(self, input))]
    pub async fn create_item(&self, input: CreateItemInput) -> Result<item::Model, ServiceError> {
        input.validate()?;
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        let sku = input.sku.unwrap_or_else(generate_sku);
        let existing = Item::find()
            .filter(item::Column::Sku.eq(sku.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "SKU {} is already in use",
                sku
            )));
        }

        let now = Utc::now();
        let item_id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        let item = item::ActiveModel {
            id: Set(item_id),
            name: Set(input.name),
            description: Set(input.description),
            sku: Set(sku.clone()),
            price: Set(input.price),
            quantity: Set(input.quantity),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            restocked_at: Set(None),
        }
        .insert(&txn)
        .await?;

        if input.quantity > 0 {
            self.stock_ledger
                .record_initial_stock(&txn, item_id, input.quantity)
                .await?;
        }

        txn.commit().await?;

        info!(item_id = %item_id, sku = %sku, "item created");
        self.event_sender
            .send_or_log(Event::ItemCreated { item_id, sku })
            .await;

        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, item_id: Uuid) -> Result<item::Model, ServiceError> {
        Item::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        filter: ItemListFilter,
    ) -> Result<(Vec<item::Model>, u64), ServiceError> {
        let page = filter.page.unwrap_or(1).max(1);
        let per_page = filter.per_page.unwrap_or(50).clamp(1, 200);

        let mut query = Item::find().order_by_asc(item::Column::Name);
        if let Some(is_active) = filter.is_active {
            query = query.filter(item::Column::IsActive.eq(is_active));
        }
        if filter.in_stock_only {
            query = query.filter(item::Column::Quantity.gt(0));
        }
        if let Some(threshold) = filter.low_stock_threshold {
            query = query.filter(item::Column::Quantity.lte(threshold));
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> Result<item::Model, ServiceError> {
        input.validate()?;
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price cannot be negative".to_string(),
                ));
            }
        }

        let item = self.get_item(item_id).await?;

        let mut update: item::ActiveModel = item.into();
        if let Some(name) = input.name {
            update.name = Set(name);
        }
        if let Some(description) = input.description {
            update.description = Set(description);
        }
        if let Some(price) = input.price {
            update.price = Set(price);
        }
        if let Some(is_active) = input.is_active {
            update.is_active = Set(is_active);
        }
        update.updated_at = Set(Utc::now());

        Ok(update.update(&*self.db).await?)
    }

    /// Adds stock through the ledger and stamps `restocked_at`.
    #[instrument(skip(self))]
    pub async fn restock(&self, item_id: Uuid, quantity: i32) -> Result<item::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Restock quantity must be positive".to_string(),
            ));
        }

        let item = self.get_item(item_id).await?;

        let txn = self.db.begin().await?;
        self.stock_ledger
            .credit(&txn, item_id, quantity, MovementReason::Restock)
            .await?;

        let mut update: item::ActiveModel = item.into();
        update.restocked_at = Set(Some(Utc::now()));
        update.updated_at = Set(Utc::now());
        let item = update.update(&txn).await?;
        txn.commit().await?;

        info!(item_id = %item_id, quantity, "item restocked");
        self.event_sender
            .send_or_log(Event::ItemRestocked { item_id, quantity })
            .await;

        // Re-read: the ledger bumped the counter after our snapshot.
        self.get_item(item.id).await
    }

    /// Manual stock correction after a physical count. Positive adds,
    /// negative removes; either way the ledger records an `adjustment`.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        item_id: Uuid,
        quantity_change: i32,
    ) -> Result<item::Model, ServiceError> {
        if quantity_change == 0 {
            return Err(ServiceError::ValidationError(
                "Adjustment cannot be zero".to_string(),
            ));
        }

        self.get_item(item_id).await?;

        let txn = self.db.begin().await?;
        if quantity_change > 0 {
            self.stock_ledger
                .credit(&txn, item_id, quantity_change, MovementReason::Adjustment)
                .await?;
        } else {
            self.stock_ledger
                .debit(&txn, item_id, -quantity_change, MovementReason::Adjustment)
                .await?;
        }
        txn.commit().await?;

        info!(item_id = %item_id, quantity_change, "stock adjusted");
        self.get_item(item_id).await
    }

    /// Full movement history for an item, newest first.
    pub async fn movement_history(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<crate::entities::stock_movement::Model>, ServiceError> {
        self.stock_ledger.movements_for_item(item_id).await
    }
}
