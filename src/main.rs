use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use project_db_api::config::AppConfig;
use project_db_api::database::{DatabaseManager, ProjectDatabaseRepository, ProjectDatabaseStore};
use project_db_api::engines::EngineRegistry;
use project_db_api::handlers::{self, AppState};
use project_db_api::services::ProvisioningService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, ADMIN_MYSQL_*, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting Project Database API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set; every protected route will answer 401");
    }

    let manager = DatabaseManager::connect_lazy(&config.database).context("record store configuration")?;
    if let Err(e) = manager.migrate().await {
        // Keep serving so /health can report the outage
        tracing::warn!("Record store migrations not applied: {}", e);
    }

    let store: Arc<dyn ProjectDatabaseStore> = Arc::new(ProjectDatabaseRepository::new(manager.pool().clone()));
    let registry = EngineRegistry::from_config(&config);
    for binding in registry.bindings() {
        tracing::info!(flavour = %binding.flavour, host = %binding.host, port = binding.port, "Flavour configured");
    }

    let provisioning = ProvisioningService::new(store.clone(), registry);
    let app = handlers::router(AppState::new(store, provisioning, &config.security.jwt_secret));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Project Database API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server")?;

    manager.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
