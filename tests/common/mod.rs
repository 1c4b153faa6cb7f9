use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db,
    entities::{item, stock_movement},
    events,
    migrator::Migrator,
    AppState,
};

/// Test harness: application state backed by an in-memory SQLite database.
///
/// A single pooled connection keeps the in-memory database alive and shared
/// across the whole test.
pub struct TestApp {
    pub state: Arc<AppState>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = test_config();
        let conn = db::establish_connection(&cfg)
            .await
            .expect("test database connection");
        Migrator::up(&conn, None).await.expect("test migrations");

        let (event_sender, event_rx) = events::event_channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = Arc::new(AppState::new(
            Arc::new(conn),
            Arc::new(cfg),
            event_sender,
        ));

        Self {
            state,
            _event_task: event_task,
        }
    }

    /// Inserts a catalog item with an opening balance, logging the matching
    /// `initial_stock` movement so the ledger reconciles.
    pub async fn seed_item(&self, name: &str, price: Decimal, quantity: i32) -> item::Model {
        let now = Utc::now();
        let item_id = Uuid::new_v4();

        let item = item::ActiveModel {
            id: Set(item_id),
            name: Set(name.to_string()),
            description: Set(format!("{name} description")),
            sku: Set(format!("ITEM-{}", &item_id.simple().to_string()[..8].to_uppercase())),
            price: Set(price),
            quantity: Set(quantity),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            restocked_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed item");

        if quantity > 0 {
            stock_movement::ActiveModel {
                id: Set(Uuid::new_v4()),
                item_id: Set(item_id),
                quantity_change: Set(quantity),
                reason: Set("initial_stock".to_string()),
                created_at: Set(now),
            }
            .insert(&*self.state.db)
            .await
            .expect("seed initial movement");
        }

        item
    }

    /// Inserts an inactive item.
    pub async fn seed_inactive_item(&self, name: &str, price: Decimal, quantity: i32) -> item::Model {
        let seeded = self.seed_item(name, price, quantity).await;
        let mut update: item::ActiveModel = seeded.into();
        update.is_active = Set(false);
        update.update(&*self.state.db).await.expect("deactivate item")
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 18080,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: true,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        default_tax_rate: Decimal::ZERO,
        flat_shipping_cost: Decimal::ZERO,
    }
}
