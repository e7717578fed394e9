//! API module for the registrations dashboard
//!
//! REST interface over the shared analytics service.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod service;

pub use service::{AnalyticsService, RegistrationQuery, RegistrationsReport};

pub fn create_router(service: Arc<AnalyticsService>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/registrations", get(handlers::get_registrations))
        .route("/api/insights", get(handlers::get_insights))
        .route("/api/manufacturers", get(handlers::get_manufacturers))
        .route("/api/refresh-data", post(handlers::refresh_data))
        // State and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
