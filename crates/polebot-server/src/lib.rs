pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

use anyhow::Result;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::{config::ServerConfig, telemetry::TelemetryHub};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub telemetry: TelemetryHub,
}

impl AppState {
    pub fn new(connection: Connection, telemetry: TelemetryHub) -> Self {
        Self { db: Arc::new(Mutex::new(connection)), telemetry }
    }
}

pub async fn serve(config: &ServerConfig) -> Result<()> {
    let connection = db::open(&config.db_path)?;
    let state = AppState::new(connection, TelemetryHub::new(config.telemetry_interval()));
    let app = api::router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("polebot server listening on http://{}", addr);
    info!("sqlite database at {}", config.db_path.display());
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("polebot server stopped");
    Ok(())
}
