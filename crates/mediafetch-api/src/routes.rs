//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::error::redact_internal_errors;
use crate::handlers::{download_file, health, index, ready, submit};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(
        RateLimiterCache::new(state.config.rate_limit_rps)
            .trust_proxy_headers(state.config.trust_proxy_headers),
    );

    // Only submissions start a pipeline run, so only they are rate limited
    let submit_routes = Router::new().route(
        "/",
        get(index).merge(post(submit).route_layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ))),
    );

    let download_routes = Router::new().route("/download/:filename", get(download_file));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let thumbnails = ServeDir::new(state.roots().thumbnail_dir());

    let mut router = Router::new()
        .merge(submit_routes)
        .merge(download_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .nest_service(&state.config.thumbnail_url_prefix, thumbnails);

    if state.config.is_production() {
        router = router.layer(middleware::from_fn(redact_internal_errors));
    }

    router
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
