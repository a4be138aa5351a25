//! Local HTTP control surface for crawl jobs.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/has_login", get(handlers::has_login))
        .route("/open_login", get(handlers::open_login))
        .route("/save_login", get(handlers::save_login))
        .route("/crawl", get(handlers::crawl_keywords))
        .route("/crawl_url", get(handlers::crawl_url))
        .route("/progress", get(handlers::progress))
        .route("/stop", get(handlers::stop))
        .route("/resume", get(handlers::resume))
        .route("/transform", get(handlers::transform))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
