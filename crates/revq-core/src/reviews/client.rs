//! HTTP implementation of [`ReviewSource`] against the publication API.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::{
    fuzzy_name_match, ProductQuery, ProductReviews, ProviderCredentials, Review, ReviewSource,
    ShopReviews,
};

/// Review provider client.
///
/// Endpoints:
/// - product: `GET /v1/publication/product/review/external?locationId=..&productCode=..`
/// - location-wide (name fallback): same endpoint without `productCode`
/// - shop: `GET /v1/publication/review/external?locationId=..`
///
/// Authentication is a per-tenant `X-Publication-Api-Token` header.
#[derive(Debug, Clone)]
pub struct HttpReviewSource {
    client: reqwest::Client,
    base_url: String,
}

const API_TOKEN_HEADER: &str = "X-Publication-Api-Token";

impl HttpReviewSource {
    /// Creates a client for the given provider base URL with a bounded
    /// request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_product_payload(
        &self,
        creds: &ProviderCredentials,
        product_code: Option<&str>,
    ) -> Option<WireProductResponse> {
        let mut url = format!(
            "{}/v1/publication/product/review/external?locationId={}",
            self.base_url, creds.location_id
        );
        if let Some(code) = product_code {
            url.push_str("&productCode=");
            url.push_str(&urlencode(code));
        }

        self.get_json(&url, creds).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        creds: &ProviderCredentials,
    ) -> Option<T> {
        let response = match self
            .client
            .get(url)
            .header(API_TOKEN_HEADER, &creds.api_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "review provider request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "review provider returned error status");
            return None;
        }

        match response.json::<T>().await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(error = %e, "review provider returned unparseable payload");
                None
            }
        }
    }
}

#[async_trait]
impl ReviewSource for HttpReviewSource {
    async fn product_reviews(
        &self,
        creds: &ProviderCredentials,
        query: &ProductQuery,
    ) -> ProductReviews {
        if let Some(code) = query.code.as_deref() {
            if let Some(payload) = self.fetch_product_payload(creds, Some(code)).await {
                let result = payload.into_product_reviews();
                if !result.is_empty() {
                    return result;
                }
            }
        }

        // Broader location-wide query, filtered by product name.
        if let Some(name) = query.name.as_deref().filter(|n| !n.trim().is_empty()) {
            if let Some(payload) = self.fetch_product_payload(creds, None).await {
                return filter_by_name(payload.into_product_reviews(), name);
            }
        }

        ProductReviews::default()
    }

    async fn shop_reviews(&self, creds: &ProviderCredentials) -> ShopReviews {
        let url = format!(
            "{}/v1/publication/review/external?locationId={}",
            self.base_url, creds.location_id
        );

        match self.get_json::<WireShopResponse>(&url, creds).await {
            Some(payload) => ShopReviews {
                average_rating: payload.average_rating,
                review_count: payload.number_reviews.unwrap_or(0),
                recommendation_percentage: payload.recommendation_percentage,
            },
            None => ShopReviews::default(),
        }
    }
}

/// Keeps only reviews whose product name fuzzy-matches `name`.
fn filter_by_name(all: ProductReviews, name: &str) -> ProductReviews {
    let reviews: Vec<Review> = all
        .reviews
        .into_iter()
        .filter(|r| {
            r.product_name
                .as_deref()
                .is_some_and(|candidate| fuzzy_name_match(name, candidate))
        })
        .collect();

    let product_name = reviews.iter().find_map(|r| r.product_name.clone());
    let review_count = reviews.len();

    ProductReviews {
        product_name,
        average_rating: if reviews.is_empty() {
            None
        } else {
            all.average_rating
        },
        review_count,
        reviews,
    }
}

/// Minimal percent-encoding for the product code query parameter.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProductResponse {
    #[serde(default)]
    reviews: Vec<WireReview>,
    #[serde(default)]
    number_reviews: Option<usize>,
    #[serde(default)]
    average_rating: Option<f32>,
    #[serde(default)]
    location_product: Vec<WireLocationProduct>,
}

impl WireProductResponse {
    fn into_product_reviews(self) -> ProductReviews {
        let product_name = self
            .location_product
            .first()
            .and_then(|p| p.product_name.clone());

        let reviews: Vec<Review> = self.reviews.into_iter().map(WireReview::into_review).collect();
        let review_count = self.number_reviews.unwrap_or(reviews.len());

        ProductReviews {
            product_name,
            average_rating: self.average_rating,
            review_count,
            reviews,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireShopResponse {
    #[serde(default)]
    number_reviews: Option<usize>,
    #[serde(default)]
    average_rating: Option<f32>,
    #[serde(default)]
    recommendation_percentage: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLocationProduct {
    #[serde(default)]
    product_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReview {
    #[serde(default)]
    rating: Option<f32>,
    #[serde(default)]
    oneliner: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    review_author: Option<String>,
    /// Either an ISO 8601 string or an epoch-milliseconds number.
    #[serde(default)]
    date_since: Option<serde_json::Value>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    review_language: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
}

impl WireReview {
    fn into_review(self) -> Review {
        Review {
            rating: self.rating.unwrap_or(0.0),
            title: self.oneliner,
            text: self.description,
            author: self.review_author,
            date: self.date_since.as_ref().map_or_else(epoch, parse_wire_date),
            city: self.city,
            language: self.review_language,
            product_name: self.product_name,
        }
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

fn parse_wire_date(value: &serde_json::Value) -> DateTime<Utc> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .or_else(|_| {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
            })
            .unwrap_or_else(|_| epoch()),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_else(epoch),
        _ => epoch(),
    }
}

#[cfg(test)]
mod wire_tests {
    use super::*;

    #[test]
    fn test_parses_iso_date() {
        let date = parse_wire_date(&serde_json::json!("2026-08-01T12:00:00Z"));
        assert_eq!(date.to_rfc3339(), "2026-08-01T12:00:00+00:00");
    }

    #[test]
    fn test_parses_plain_date() {
        let date = parse_wire_date(&serde_json::json!("2026-08-01"));
        assert_eq!(date.format("%Y-%m-%d").to_string(), "2026-08-01");
    }

    #[test]
    fn test_parses_epoch_millis() {
        let date = parse_wire_date(&serde_json::json!(1_756_000_000_000_i64));
        assert_eq!(date.timestamp_millis(), 1_756_000_000_000);
    }

    #[test]
    fn test_unparseable_date_falls_back_to_epoch() {
        let date = parse_wire_date(&serde_json::json!("last tuesday"));
        assert_eq!(date.timestamp(), 0);
    }

    #[test]
    fn test_wire_product_response_maps_fields() {
        let payload: WireProductResponse = serde_json::from_value(serde_json::json!({
            "reviews": [{
                "rating": 8.5,
                "oneliner": "Great",
                "description": "Works well",
                "reviewAuthor": "Anna",
                "dateSince": "2026-08-01T00:00:00Z",
                "city": "Utrecht",
                "reviewLanguage": "nl"
            }],
            "numberReviews": 42,
            "averageRating": 8.7,
            "locationProduct": [{"productName": "Rain Jacket"}]
        }))
        .unwrap();

        let result = payload.into_product_reviews();
        assert_eq!(result.product_name.as_deref(), Some("Rain Jacket"));
        assert_eq!(result.review_count, 42);
        assert_eq!(result.reviews.len(), 1);
        assert_eq!(result.reviews[0].rating, 8.5);
        assert_eq!(result.reviews[0].author.as_deref(), Some("Anna"));
    }

    #[test]
    fn test_urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("AB 1/2"), "AB%201%2F2");
        assert_eq!(urlencode("plain-code_1.0~x"), "plain-code_1.0~x");
    }
}
