//! HTTP and WebSocket surface.

mod error;
mod handlers;
mod identity;
mod state;
mod ws;

pub use error::{ApiError, ErrorResponse};
pub use handlers::derive_title;
pub use identity::CurrentUser;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/info", get(handlers::info))
        .route("/api/chats", post(handlers::create_chat))
        .route("/api/chats/{chat_id}/messages", post(handlers::create_message))
        .route(
            "/api/chats/{chat_id}/messages/regenerate",
            post(handlers::regenerate),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
