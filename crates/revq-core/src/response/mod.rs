//! Outbound response payloads.
//!
//! Serialized shapes are part of the widget contract; field names are
//! camelCase on the wire and cached answers round-trip through these types
//! unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generate::Confidence;

/// Response header carrying the cache outcome for a request.
pub const REVQ_CACHE_HEADER: &str = "X-Revq-Cache";

/// Whether the answer was served from the cache or freshly generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Header value for [`REVQ_CACHE_HEADER`].
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A complete answer to a product question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QAResponse {
    /// The question as asked (not normalized).
    pub question: String,

    /// Generated answer text.
    pub answer: String,

    /// Heuristic confidence in the answer.
    pub confidence: Confidence,

    /// The product the answer is about.
    pub product: ProductSummary,

    /// Shop-level aggregates, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop: Option<ShopSummary>,

    /// The top-ranked review excerpts the answer was grounded on.
    pub relevant_reviews: Vec<ReviewExcerpt>,

    pub metadata: ResponseMeta,
}

/// Identification and aggregates of the resolved product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    /// Canonical product code the pipeline resolved to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Average rating on the provider's 10-point scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,

    pub review_count: usize,
}

/// Shop-level rating aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,

    pub review_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_percentage: Option<f32>,
}

/// One review excerpt shown alongside the answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewExcerpt {
    pub rating: f32,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub date: DateTime<Utc>,
}

/// Answer metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// When the answer was generated. A cache hit keeps the original
    /// generation timestamp.
    pub answered_at: DateTime<Utc>,

    /// Whether this answer came from the cache.
    pub cached: bool,

    /// Rough token estimate for the generation round trip.
    pub approx_tokens: usize,

    /// Wall time spent producing the answer, in milliseconds.
    pub response_time_ms: u64,
}
