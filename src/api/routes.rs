//! API Routes
//!
//! Configures the Axum router with all query endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    age_histogram_handler, count_handler, create_handler, delete_handler, health_handler,
    invalidate_handler, page_handler, stats_handler, top_breeds_handler, update_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /animals/page` - One page of filtered rows
/// - `POST /animals/count` - Number of matching rows
/// - `POST /animals` - Insert a record
/// - `PATCH /animals` - Update matching records
/// - `DELETE /animals` - Delete matching records
/// - `POST /metrics/top-breeds` - Most frequent breeds
/// - `POST /metrics/age-histogram` - Age distribution in weeks
/// - `POST /cache/invalidate` - Drop every cached aggregate
/// - `GET /stats` - Result cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/animals",
            post(create_handler)
                .patch(update_handler)
                .delete(delete_handler),
        )
        .route("/animals/page", post(page_handler))
        .route("/animals/count", post(count_handler))
        .route("/metrics/top-breeds", post(top_breeds_handler))
        .route("/metrics/age-histogram", post(age_histogram_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
