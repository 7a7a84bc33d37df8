use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use revq::generate::GenerateError;
use revq::pipeline::PipelineError;
use revq::response::REVQ_CACHE_HEADER;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown tenant")]
    UnknownTenant,

    #[error("no product could be identified for this question")]
    NotAnswerable,

    #[error("generation provider rejected credentials")]
    Unauthorized,

    #[error("generation provider temporarily unavailable")]
    ServiceUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for GatewayError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::NotAnswerable => GatewayError::NotAnswerable,
            PipelineError::Generation(GenerateError::Auth { .. }) => GatewayError::Unauthorized,
            PipelineError::Generation(GenerateError::Quota { .. }) => {
                GatewayError::ServiceUnavailable
            }
            PipelineError::Generation(GenerateError::Provider { message }) => {
                GatewayError::Internal(message)
            }
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, cache_status) = match &self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::UnknownTenant => (StatusCode::NOT_FOUND, "unknown_tenant"),
            GatewayError::NotAnswerable => (StatusCode::NOT_FOUND, "not_answerable"),
            GatewayError::Unauthorized => (StatusCode::UNAUTHORIZED, "provider_auth"),
            GatewayError::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_quota")
            }
            GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            REVQ_CACHE_HEADER,
            HeaderValue::from_str(cache_status).unwrap_or(HeaderValue::from_static("error")),
        );

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
        });

        (status, headers, body).into_response()
    }
}
