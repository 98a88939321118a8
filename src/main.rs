//! GDZ catalog · school-task answer catalog backend
//!
//! - Axum HTTP + WebSocket API carrying chat turns
//! - SQLite catalog with contributor submissions and curator moderation
//! - Outbound notifications (log, optional webhook)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   GDZ_CONFIG_PATH    : path to TOML config
//!   CURATOR_ID         : conversation id of the curator
//!   DATABASE_PATH      : SQLite file (default "gdz_catalog.db")
//!   MEDIA_DIR          : screenshot directory (default "task_media")
//!   NOTIFY_WEBHOOK_URL : enables webhook notifications if present
//!   NOTIFY_DISABLED    : "true"/"1" turns notifications off
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod resolver;
mod store;
mod media;
mod notify;
mod token;
mod session;
mod submission;
mod navigation;
mod moderation;
mod protocol;
mod render;
mod state;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Config file + env, then the catalog and the notification worker.
  let config = config::load_config();
  let state = Arc::new(AppState::from_config(config)?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "gdz_catalog", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "gdz_catalog", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "gdz_catalog", error = %e, "Could not listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "gdz_catalog", "Shutdown requested");
}
