use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Multipart framing and the text fields ride on top of the file itself.
const FORM_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize + FORM_OVERHEAD;

    let mut router = Router::new()
        // Catalog
        .route("/subjects", get(handlers::list_subjects))
        .route("/catalog", get(handlers::catalog))
        .route("/stats", get(handlers::stats))
        // Notes
        .route(
            "/notes",
            get(handlers::list_notes)
                .merge(post(handlers::create_note).layer(DefaultBodyLimit::max(upload_limit))),
        )
        .route("/notes/recent", get(handlers::recent_notes))
        // Attached files
        .route("/files/:key", get(handlers::serve_file))
        // Internal
        .route("/_internal/notes/:id/approve", post(handlers::approve_note))
        .route("/_internal/cluster/status", get(handlers::cluster_status))
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
