//! HTTP control surface: one `axum::Router` per admin area, merged under a
//! shared [`crate::Runtime`] state at startup.

pub mod execution_routes;
pub mod games;
pub mod gamestate_routes;
pub mod health;
pub mod risk_routes;
pub mod strategy_routes;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::request_logging_simple;
use crate::Runtime;

pub fn router(runtime: Arc<Runtime>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(games::router())
        .merge(gamestate_routes::router())
        .merge(strategy_routes::router())
        .merge(risk_routes::router())
        .merge(execution_routes::router())
        .layer(axum_middleware::from_fn(request_logging_simple))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(runtime)
}
