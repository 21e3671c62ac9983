use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use helpdesk::config::AppConfig;
use helpdesk::shared::state::AppState;
use helpdesk::shared::utils::{create_conn, run_migrations};
use helpdesk::tickets::configure_tickets_routes;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down helpdesk server...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::load()?;

    let pool = match create_conn(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to create database pool: {}", e);
            return Err(e.into());
        }
    };
    if let Err(e) = run_migrations(&pool) {
        error!("Failed to run migrations: {}", e);
        return Err(anyhow::anyhow!("migrations failed: {}", e));
    }

    let addr = config.bind_address();
    let app_state = Arc::new(AppState::new(pool, Some(config)));
    let app = configure_tickets_routes().with_state(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return Err(e.into());
        }
    };
    info!("Helpdesk listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
