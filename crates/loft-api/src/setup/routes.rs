use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws;

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut files = Router::new().route(
        "/secure/{file_id}",
        get(crate::handlers::secure_file::secure_file),
    );

    // Path-based file URLs resolve against the storage tree. Production
    // fronts every file through the secure endpoint instead, so the tree
    // stays dark there.
    if !state.config.is_production() {
        files = files.fallback_service(ServeDir::new(&state.config.storage_root));
    }

    Router::new()
        .route("/health", get(health))
        .route("/ws/files", get(ws::upload_socket))
        .nest("/files", files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
