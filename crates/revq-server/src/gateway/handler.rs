//! Request handlers for the Q&A gateway.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use revq::cache::PopularQuestion;
use revq::pipeline::RequestMeta;
use revq::request::QARequest;
use revq::response::REVQ_CACHE_HEADER;
use revq::reviews::ProviderCredentials;
use revq::store::QaHistoryEntry;

use super::error::GatewayError;
use super::state::HandlerState;

/// Uniform success envelope, mirrored by [`super::error::ErrorResponse`].
#[derive(Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    RequestMeta {
        ip_address,
        user_agent,
    }
}

async fn tenant_token(state: &HandlerState, tenant_id: &str) -> Result<String, GatewayError> {
    match state.customers.access_token(tenant_id).await {
        Ok(Some(token)) => Ok(token),
        Ok(None) => Err(GatewayError::UnknownTenant),
        Err(e) => Err(GatewayError::Internal(e.to_string())),
    }
}

#[tracing::instrument(skip(state, headers, request), fields(tenant_id = %request.tenant_id))]
pub async fn qa_handler(
    State(state): State<HandlerState>,
    headers: HeaderMap,
    Json(request): Json<QARequest>,
) -> Result<Response, GatewayError> {
    request
        .validate()
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    let token = tenant_token(&state, &request.tenant_id).await?;
    let meta = request_meta(&headers);

    let (response, status) = state.pipeline.answer(&request, &token, meta).await?;

    let mut out_headers = HeaderMap::new();
    out_headers.insert(
        REVQ_CACHE_HEADER,
        HeaderValue::from_static(status.as_header_value()),
    );

    Ok((out_headers, Envelope::ok(response)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct PopularData {
    pub questions: Vec<PopularQuestion>,
}

#[tracing::instrument(skip(state))]
pub async fn popular_questions_handler(
    State(state): State<HandlerState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Json<Envelope<PopularData>> {
    let limit = query.limit.unwrap_or(10);
    let questions = state.pipeline.cache().popular_questions(&tenant_id, limit).await;

    Envelope::ok(PopularData { questions })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryData {
    pub product_code: String,
    pub qa_history: Vec<QaHistoryEntry>,
}

#[tracing::instrument(skip(state))]
pub async fn history_handler(
    State(state): State<HandlerState>,
    Path(product_code): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Envelope<HistoryData>>, GatewayError> {
    let limit = query.limit.unwrap_or(20).min(100) as i64;

    let qa_history = state
        .pipeline
        .store()
        .history(&product_code, limit)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    Ok(Envelope::ok(HistoryData {
        product_code,
        qa_history,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopRatingData {
    pub rating: f32,
    pub review_count: usize,
    pub recommendation_percentage: f32,
}

#[tracing::instrument(skip(state))]
pub async fn shop_rating_handler(
    State(state): State<HandlerState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Envelope<ShopRatingData>>, GatewayError> {
    let token = tenant_token(&state, &tenant_id).await?;

    let creds = ProviderCredentials {
        location_id: tenant_id,
        api_token: token,
    };
    let shop = state.pipeline.reviews().shop_reviews(&creds).await;

    Ok(Envelope::ok(ShopRatingData {
        rating: shop.average_rating.unwrap_or(0.0),
        review_count: shop.review_count,
        recommendation_percentage: shop.recommendation_percentage.unwrap_or(0.0),
    }))
}
