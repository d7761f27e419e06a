pub mod handlers;
pub mod metrics;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use handlers::AppState;
use metrics::MetricsMiddleware;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn create_app(state: AppState) -> Router {
    let state = Arc::new(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::service_status))
        .route("/health", get(handlers::health_check))
        .route("/analyze/", post(handlers::analyze))
        .route("/celebrities/", get(handlers::list_celebrities))
        .route("/celebrities/:name/image", get(handlers::celebrity_image))
        .route("/csv-stats/", get(handlers::csv_stats))
        .route("/reload-celebrities/", post(handlers::reload_celebrities))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(MetricsMiddleware::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
