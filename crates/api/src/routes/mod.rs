pub mod conversation;
pub mod health;
pub mod ui;

use axum::{routing::get, Router};
use bearmobile_core::SupportCore;
use std::sync::Arc;

use crate::{websocket::websocket_handler, ApiConfig};

pub fn create_routes(core: Arc<SupportCore>, config: &ApiConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(ui::index))
        .nest("/health", health::routes())
        .route("/metrics", get(health::metrics))
        .nest("/api/v1", conversation::routes());

    if config.enable_websockets {
        router = router.route("/ws/chat", get(websocket_handler));
    }

    router.fallback(not_found_handler).with_state(core)
}

// Fallback handler for unmatched routes
pub async fn not_found_handler() -> axum::http::StatusCode {
    axum::http::StatusCode::NOT_FOUND
}
