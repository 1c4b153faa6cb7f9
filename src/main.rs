use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::signal;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use storefront_api::{api_v1_routes, config, db, events, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;
    config::init_tracing(&cfg.log_level, cfg.log_json);
    info!(environment = %cfg.environment, "starting storefront-api");

    let conn = db::establish_connection(&cfg).await?;
    if cfg.auto_migrate {
        db::run_migrations(&conn).await?;
    }
    let db = Arc::new(conn);

    let (event_sender, event_rx) = events::event_channel(1024);
    tokio::spawn(events::process_events(event_rx));

    let config = Arc::new(cfg);
    let state = Arc::new(AppState::new(db, config.clone(), event_sender));

    let cors_layer = if config.is_production() {
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    };

    let app = Router::new()
        .route("/", get(|| async { "storefront-api up" }))
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state);

    let addr = config.bind_address();
    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
