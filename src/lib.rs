pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod routes;
pub mod thread;

use axum::{Router, extract::DefaultBodyLimit, response::IntoResponse, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use backend::BackendClient;
use config::AppConfig;
use poller::PollSettings;
use routes::{
    analysis_routes, comments_routes, history_routes, review_comments_routes, review_routes,
    trade_analysis_routes,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub poll: PollSettings,
}

impl AppState {
    pub fn new(backend: BackendClient, poll: PollSettings) -> Self {
        Self { backend, poll }
    }
}

pub fn build_app(state: AppState, config: &AppConfig) -> Router {
    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        .nest("/api/analysis", analysis_routes())
        .nest("/api/history", history_routes())
        .nest("/api/review", review_routes())
        .nest("/api/review-comments", review_comments_routes())
        .nest("/api/comment", comments_routes())
        .nest("/api/trade-analysis", trade_analysis_routes())
        .route("/api/health", get(health_check));

    Router::new()
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "healthy"}))
}
