pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};

use crate::builder::handlers;
use crate::state::AppState;

/// Upper bound on a raster export request: two full-page captures at 2x scale.
const MAX_CAPTURE_BYTES: usize = 32 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/builder/health", get(health::health_handler))
        .route("/api/v1/builder/datasets", get(handlers::handle_list_datasets))
        // Sessions
        .route(
            "/api/v1/builder/sessions",
            post(handlers::handle_create_session),
        )
        .route(
            "/api/v1/builder/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        // Document edits
        .route(
            "/api/v1/builder/sessions/:id/fields",
            patch(handlers::handle_update_field),
        )
        .route(
            "/api/v1/builder/sessions/:id/lists",
            put(handlers::handle_replace_list),
        )
        .route(
            "/api/v1/builder/sessions/:id/lists/item",
            patch(handlers::handle_update_list_item),
        )
        .route(
            "/api/v1/builder/sessions/:id/lists/items",
            post(handlers::handle_add_list_item),
        )
        .route(
            "/api/v1/builder/sessions/:id/lists/remove",
            post(handlers::handle_remove_list_item),
        )
        .route(
            "/api/v1/builder/sessions/:id/reset",
            post(handlers::handle_reset),
        )
        // Presentation
        .route(
            "/api/v1/builder/sessions/:id/editing",
            put(handlers::handle_set_editing),
        )
        .route(
            "/api/v1/builder/sessions/:id/ats-mode",
            put(handlers::handle_set_ats_mode),
        )
        .route(
            "/api/v1/builder/sessions/:id/customization",
            patch(handlers::handle_update_customization),
        )
        .route(
            "/api/v1/builder/sessions/:id/preview",
            get(handlers::handle_preview),
        )
        // Exports
        .route(
            "/api/v1/builder/sessions/:id/export/json",
            get(handlers::handle_export_json),
        )
        .route(
            "/api/v1/builder/sessions/:id/export/pdf",
            get(handlers::handle_export_pdf),
        )
        .route(
            "/api/v1/builder/sessions/:id/export/pdf/raster",
            post(handlers::handle_export_raster_pdf).layer(DefaultBodyLimit::max(MAX_CAPTURE_BYTES)),
        )
        .with_state(state)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
