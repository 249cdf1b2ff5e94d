//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .nest("/api/v1", api_routes())
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(http::http_health))
        // Library
        .route("/exercises", get(http::http_list_exercises).post(http::http_create_exercise))
        .route("/exercises/export", get(http::http_export_exercises))
        .route("/exercises/import", post(http::http_import_exercises))
        .route(
            "/exercises/:id",
            get(http::http_get_exercise)
                .put(http::http_update_exercise)
                .delete(http::http_delete_exercise),
        )
        .route("/folders", get(http::http_list_folders).post(http::http_create_folder))
        .route("/folders/:id", put(http::http_update_folder).delete(http::http_delete_folder))
        .route("/categories", get(http::http_list_categories).post(http::http_add_category))
        .route("/categories/:name", axum::routing::delete(http::http_delete_category))
        // Progress + settings
        .route("/progress", get(http::http_get_progress))
        .route("/progress/calendar", get(http::http_get_calendar))
        .route("/progress/reset", post(http::http_reset_progress))
        .route("/settings", get(http::http_get_settings).put(http::http_put_settings))
        // Session
        .route(
            "/session",
            get(http::http_get_session)
                .post(http::http_start_session)
                .delete(http::http_end_session),
        )
        .route("/session/answer", post(http::http_post_answer))
        .route("/session/hint", post(http::http_post_hint))
        .route("/session/reveal", post(http::http_post_reveal))
        // AI generation
        .route("/ai/chat", post(http::http_post_ai_chat))
}
