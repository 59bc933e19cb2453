//! Axum HTTP API server for the mediafetch pipeline.
//!
//! This crate provides:
//! - Submission and single-use download routes
//! - Static serving of finalized thumbnails
//! - Rate limiting, request ids and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, ToolStatus};
