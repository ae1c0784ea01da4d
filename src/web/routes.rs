//! Route definitions

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let compression = state.settings.server.compression;

    let router = Router::new()
        .route("/health", get(handlers::health))
        // Search and place data
        .route("/api/search", get(handlers::search))
        .route("/api/soup-types", get(handlers::soup_types))
        .route("/api/places/:id", get(handlers::place_details))
        .route("/api/places/:id/summary", get(handlers::place_summary))
        .route("/api/places/:id/tags", get(handlers::place_tags))
        // Service state
        .route("/api/stats", get(handlers::stats))
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/cache", delete(handlers::clear_cache))
        // Personal library
        .route(
            "/api/favorites",
            get(handlers::list_favorites).post(handlers::add_favorite),
        )
        .route(
            "/api/favorites/:id",
            patch(handlers::update_favorite).delete(handlers::remove_favorite),
        )
        .route("/api/bookmarks", get(handlers::list_bookmarks))
        .route("/api/bookmarks/:id", post(handlers::toggle_bookmark))
        .route(
            "/api/visits",
            get(handlers::list_visits).post(handlers::add_visit),
        )
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::add_post),
        )
        .route("/api/posts/:id", delete(handlers::remove_post))
        .route("/api/posts/:id/like", post(handlers::like_post))
        .route("/api/library/export", get(handlers::export_library))
        .route("/api/library/import", post(handlers::import_library))
        // Feedback intake
        .route(
            "/api/feedback",
            get(handlers::list_feedback).post(handlers::submit_feedback),
        )
        .layer(cors)
        .with_state(state);

    if compression {
        router.layer(CompressionLayer::new())
    } else {
        router
    }
}
