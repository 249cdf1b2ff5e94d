//! Codedrill · Playwright practice backend
//!
//! - Axum HTTP + WebSocket API
//! - Optional OpenAI exercise generation (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   CODEDRILL_CONFIG_PATH : path to TOML config (grading, session, storage, prompts, exercises)
//!   CODEDRILL_DATA_DIR    : directory for the JSON snapshot (overrides [storage].data_dir)
//!   OPENAI_API_KEY        : enables AI generation if present
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_MODEL          : default "gpt-4o-mini"
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use codedrill::config::load_config_from_env;
use codedrill::routes::build_router;
use codedrill::state::AppState;
use codedrill::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = load_config_from_env();

  // Shared application state (library, progress, active session, OpenAI client).
  let state = Arc::new(AppState::load(&cfg).await);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "codedrill", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  // Flush the latest state before exiting.
  if let Err(e) = state.save_now().await {
    tracing::error!(target: "codedrill", error = %e, "Final snapshot save failed");
  }
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "codedrill", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "codedrill", "Shutdown requested");
}
