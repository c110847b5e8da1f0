// High-Value Analytics Server
// HTTP endpoints over the MySQL activity data

use anyhow::Result;
use highvalue_backend::config::Config;
use highvalue_backend::database::{MySqlStore, PoolProvider};
use highvalue_backend::{router, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("highvalue_backend=info".parse()?)
                .add_directive("sqlx=warn".parse()?),
        )
        .init();

    info!("Starting High-Value Analytics Server");

    // Load configuration
    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Database: {}", config.database.redacted_url());
    info!("  Connection limit: {}", config.database.connection_limit);
    info!("  Connect timeout: {:?}", config.database.connect_timeout);
    info!("  Default inactivity threshold: {} days", config.default_threshold_days);
    info!("  Server Port: {}", config.server_port);

    // The pool connects on first use and is shared by every request
    let store = MySqlStore::new(PoolProvider::new(&config.database));

    let state = Arc::new(AppState {
        store: Arc::new(store),
        default_threshold_days: config.default_threshold_days,
    });

    let app = router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("High-Value Analytics listening on {}", listener.local_addr()?);
    info!("Endpoints:");
    info!("  GET /api/v1/users/high-value/report  - Active + dormant report (json|html)");
    info!("  GET /api/v1/users/high-value/active  - Active segment, paginated");
    info!("  GET /api/v1/users/high-value/dormant - Dormant segment, paginated");
    info!("  GET /api/v1/health                   - Liveness and database check");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
