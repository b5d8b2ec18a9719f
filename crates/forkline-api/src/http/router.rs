//! Axum router configuration with middleware.
//!
//! Chat routes are mounted at the root under `/chats`.
//! Middleware: CORS (permissive, the browser UI calls from another origin)
//! and request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let chat_routes = Router::new()
        .route(
            "/chats",
            get(handlers::chat::list_chats).post(handlers::chat::create_chat),
        )
        .route(
            "/chats/",
            get(handlers::chat::list_chats).post(handlers::chat::create_chat),
        )
        .route("/chats/fork", post(handlers::chat::fork_chat))
        .route("/chats/metrics", get(handlers::metrics::get_metrics))
        .route("/chats/{id}", get(handlers::chat::get_chat))
        .route(
            "/chats/{id}/messages",
            post(handlers::chat::post_message),
        );

    Router::new()
        .route("/health", get(health_check))
        .merge(chat_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no credential required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
