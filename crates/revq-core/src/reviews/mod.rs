//! Review source adapter.
//!
//! Wraps the external review provider behind [`ReviewSource`]. The adapter is
//! infallible on purpose: provider outages and malformed payloads degrade to
//! an empty result set, and the pipeline decides answerability from what came
//! back, not from transport errors.

pub mod client;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use client::HttpReviewSource;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockReviewSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Minimum share of target-name tokens that must appear in a candidate name
/// for a fuzzy match.
const FUZZY_MATCH_THRESHOLD: f32 = 0.7;

/// Tokens at or below this length are ignored during fuzzy matching.
const FUZZY_MIN_TOKEN_LEN: usize = 3;

/// Per-tenant credentials for the review provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    /// Provider-side tenant identifier (location id).
    pub location_id: String,
    /// Publication API token.
    pub api_token: String,
}

/// What to look a product up by. At least one field should be set; an empty
/// query yields an empty result.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub code: Option<String>,
    pub name: Option<String>,
}

/// A single product review as the pipeline sees it.
#[derive(Debug, Clone)]
pub struct Review {
    /// Rating on the provider's 10-point scale.
    pub rating: f32,
    pub title: Option<String>,
    pub text: Option<String>,
    pub author: Option<String>,
    pub date: DateTime<Utc>,
    pub city: Option<String>,
    pub language: Option<String>,
    /// Product name attached to the review in location-wide queries.
    pub product_name: Option<String>,
}

impl Review {
    /// Title and body joined for relevance matching.
    pub fn combined_text(&self) -> String {
        let mut combined = String::new();
        if let Some(title) = &self.title {
            combined.push_str(title);
        }
        if let Some(text) = &self.text {
            if !combined.is_empty() {
                combined.push(' ');
            }
            combined.push_str(text);
        }
        combined
    }

    /// Excerpt text shown to the shopper: body preferred, title as fallback.
    pub fn excerpt_text(&self) -> &str {
        self.text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.title.as_deref())
            .unwrap_or("")
    }
}

/// Result of a product review lookup.
#[derive(Debug, Clone, Default)]
pub struct ProductReviews {
    pub product_name: Option<String>,
    /// Average rating on the provider's 10-point scale.
    pub average_rating: Option<f32>,
    pub review_count: usize,
    pub reviews: Vec<Review>,
}

impl ProductReviews {
    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }
}

/// Shop-level aggregates.
#[derive(Debug, Clone, Default)]
pub struct ShopReviews {
    pub average_rating: Option<f32>,
    pub review_count: usize,
    pub recommendation_percentage: Option<f32>,
}

/// Source of product and shop reviews.
///
/// Implementations never fail: any provider error maps to the empty result.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetches reviews for one product. Queries by code when present; when
    /// that yields nothing and a name is available, falls back to a broader
    /// query filtered by [`fuzzy_name_match`].
    async fn product_reviews(
        &self,
        creds: &ProviderCredentials,
        query: &ProductQuery,
    ) -> ProductReviews;

    /// Fetches shop-level aggregates.
    async fn shop_reviews(&self, creds: &ProviderCredentials) -> ShopReviews;
}

/// Fuzzy product-name comparison.
///
/// Both names are lower-cased. A candidate matches when at least 70% of the
/// target's tokens longer than 3 characters appear (substring containment)
/// among the candidate's tokens, or when either full string contains the
/// other.
pub fn fuzzy_name_match(target: &str, candidate: &str) -> bool {
    let target = target.trim().to_lowercase();
    let candidate = candidate.trim().to_lowercase();

    if target.is_empty() || candidate.is_empty() {
        return false;
    }

    if target.contains(&candidate) || candidate.contains(&target) {
        return true;
    }

    let target_tokens: Vec<&str> = target
        .split_whitespace()
        .filter(|t| t.len() > FUZZY_MIN_TOKEN_LEN)
        .collect();

    if target_tokens.is_empty() {
        return false;
    }

    let candidate_tokens: Vec<&str> = candidate.split_whitespace().collect();
    let hits = target_tokens
        .iter()
        .filter(|t| candidate_tokens.iter().any(|c| c.contains(*t)))
        .count();

    hits as f32 / target_tokens.len() as f32 >= FUZZY_MATCH_THRESHOLD
}
