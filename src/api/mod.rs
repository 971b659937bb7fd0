//! HTTP surface: routing, CORS and the response envelope.

pub mod error;
pub mod funds;
pub mod health;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::service::FundService;

pub type SharedService = Arc<FundService>;

/// Allows the configured origins. A `*` entry allows any origin by echoing
/// the request's `Origin`, which keeps credentialed requests working.
/// Origins that are not valid header values are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin.trim() == "*") {
        warn!("CORS origins include '*', allowing any origin");
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Turns a handler panic into a 500 carrying the panic message.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unexpected error while handling request".to_string()
    };
    ApiError::Internal(anyhow::anyhow!(message)).into_response()
}

/// Layers shared by every route: panic recovery, request tracing and CORS.
pub fn with_middleware(router: Router, cors_origins: &[String]) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

pub fn create_router(service: SharedService, cors_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/api/mutual-funds", get(funds::list_funds))
        .route("/api/mutual-funds/", get(funds::list_funds))
        .route("/api/mutual-funds/search", get(funds::search_funds))
        .route("/api/mutual-funds/categories", get(funds::list_categories))
        .route(
            "/api/mutual-funds/portfolio/calculate",
            post(funds::calculate_portfolio),
        )
        .route("/api/mutual-funds/{symbol}", get(funds::fund_detail))
        .route("/api/mutual-funds/{symbol}/nav", get(funds::fund_nav))
        .route("/api/mutual-funds/{symbol}/history", get(funds::fund_history))
        .with_state(service);
    with_middleware(router, cors_origins)
}
