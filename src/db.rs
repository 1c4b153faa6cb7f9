use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::AppConfig;
use crate::migrator::Migrator;

/// Shared connection handle. sea-orm pools internally, so services clone an
/// `Arc<DbPool>` rather than managing connections themselves.
pub type DbPool = DatabaseConnection;

/// Connects using the pool sizing from the application config.
pub async fn establish_connection(config: &AppConfig) -> Result<DbPool, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(config.db_connect_timeout_secs))
        .sqlx_logging(false);

    let conn = Database::connect(options).await?;
    info!("database connection established");
    Ok(conn)
}

/// Applies all pending migrations.
pub async fn run_migrations(conn: &DbPool) -> Result<(), DbErr> {
    Migrator::up(conn, None).await?;
    info!("database migrations applied");
    Ok(())
}
