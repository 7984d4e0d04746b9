pub mod handlers;
pub mod session;
pub mod types;

use axum::extract::DefaultBodyLimit;
use axum::{Router, middleware, routing::get, routing::post};
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::server::handlers::{
    analyze_handler, index_handler, server_status_handler, session_usage_handler,
};
use crate::server::session::{PeerIpKeyExtractor, session_middleware};
use crate::server::types::AppState;
use crate::utils::constants::MULTIPART_OVERHEAD_BYTES;

pub type FloodGuardConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

pub fn app_router(
    state: Arc<AppState>,
    flood_guard: Option<Arc<FloodGuardConfig>>,
    request_timeout: Duration,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let timeout = TimeoutLayer::new(request_timeout);
    let request_body_limit =
        RequestBodyLimitLayer::new(state.max_image_bytes + MULTIPART_OVERHEAD_BYTES);

    let router = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(server_status_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/session", get(session_usage_handler))
        .layer(middleware::from_fn(session_middleware))
        .layer(DefaultBodyLimit::disable())
        .layer(timeout)
        .layer(cors)
        .layer(request_body_limit);

    let router = match flood_guard {
        Some(config) => router.layer(GovernorLayer { config }),
        None => router,
    };

    router.with_state(state)
}
