//! HTTP gateway (Axum) for the question-answering pipeline.
//!
//! This module is primarily used by the `revq` server binary.

#![allow(missing_docs)]

pub mod error;
pub mod handler;
pub mod state;

#[cfg(test)]
mod handler_tests;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::qa_handler;
pub use state::HandlerState;

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/v1/qa", post(handler::qa_handler))
        .route(
            "/v1/qa/popular/{tenant_id}",
            get(handler::popular_questions_handler),
        )
        .route(
            "/v1/qa/history/{product_code}",
            get(handler::history_handler),
        )
        .route(
            "/v1/shop/{tenant_id}/rating",
            get(handler::shop_rating_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response()
}
