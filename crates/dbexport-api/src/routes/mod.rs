use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{handlers, state::ApiState};

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))

        // Export submission and pre-flight size check
        .route("/api/v1/dbs/:name/export", post(handlers::export::create_export_task))
        .route("/api/v1/dbs/:name/export/check", post(handlers::export::check_export_size))

        // Task polling and cancellation
        .route("/api/v1/tasks", get(handlers::task::list_tasks))
        .route(
            "/api/v1/tasks/:task_id",
            get(handlers::task::get_task_status).delete(handlers::task::cancel_export_task),
        )

        // Completed file download
        .route(
            "/api/v1/exports/download/:filename",
            get(handlers::download::download_export_file),
        )

        // Statistics
        .route("/api/v1/stats", get(handlers::task::get_statistics))

        // Add state
        .with_state(state)

        // Add CORS
        .layer(CorsLayer::permissive())
}
