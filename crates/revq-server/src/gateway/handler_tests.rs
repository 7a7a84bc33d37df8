//! End-to-end gateway tests over an in-memory pipeline.

use axum::{Router, body::Body, http::Request, http::StatusCode};
use chrono::{Duration as ChronoDuration, Utc};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use revq::cache::CacheGateway;
use revq::customers::StaticCustomerDirectory;
use revq::generate::{AnswerGenerator, GenerateError, MockGenerator, StubGenerator};
use revq::pipeline::Pipeline;
use revq::ranking::RankingConfig;
use revq::response::REVQ_CACHE_HEADER;
use revq::reviews::{MockReviewSource, ProductReviews, Review, ShopReviews};
use revq::scrape::NoopScraper;
use revq::store::MemoryStore;

use crate::gateway::create_router_with_state;
use crate::gateway::state::HandlerState;

fn review(rating: f32, text: &str, days_ago: i64) -> Review {
    Review {
        rating,
        title: None,
        text: Some(text.to_string()),
        author: Some("Anna".to_string()),
        date: Utc::now() - ChronoDuration::days(days_ago),
        city: Some("Utrecht".to_string()),
        language: Some("nl".to_string()),
        product_name: None,
    }
}

fn stocked_source() -> MockReviewSource {
    MockReviewSource::new()
        .with_product(
            "123",
            ProductReviews {
                product_name: Some("Rain Jacket".to_string()),
                average_rating: Some(8.2),
                review_count: 2,
                reviews: vec![
                    review(8.0, "kept me dry through heavy rain", 3),
                    review(9.0, "completely waterproof", 8),
                ],
            },
        )
        .with_shop(ShopReviews {
            average_rating: Some(9.1),
            review_count: 1200,
            recommendation_percentage: Some(96.0),
        })
}

fn router_with(source: MockReviewSource, generator: Arc<dyn AnswerGenerator>) -> Router {
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(source),
        Arc::new(NoopScraper),
        generator,
        Arc::new(MemoryStore::new()),
        CacheGateway::in_memory(100, Duration::from_secs(300)),
        RankingConfig::default(),
    ));

    let customers = Arc::new(StaticCustomerDirectory::new().with_tenant("t1", "token-1"));

    create_router_with_state(HandlerState::new(pipeline, customers))
}

fn qa_body(tenant: &str, code: Option<&str>, question: &str) -> serde_json::Value {
    let mut body = serde_json::json!({
        "tenantId": tenant,
        "question": question,
    });
    if let Some(code) = code {
        body["productCode"] = serde_json::Value::String(code.to_string());
    }
    body
}

async fn post_qa(router: &Router, body: serde_json::Value) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/qa")
        .header("Content-Type", "application/json")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .header("user-agent", "widget-tests")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();

    router.clone().oneshot(request).await.unwrap()
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    router.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be valid JSON")
}

#[tokio::test]
async fn test_healthz() {
    let router = router_with(MockReviewSource::new(), Arc::new(StubGenerator));

    let response = get(&router, "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_qa_happy_path_is_a_miss() {
    let generator = Arc::new(MockGenerator::returning(
        "Uit reviews blijkt dat de jas waterdicht is, aldus 2 klanten.",
    ));
    let router = router_with(stocked_source(), generator);

    let response = post_qa(&router, qa_body("t1", Some("123"), "Is it waterproof?")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(REVQ_CACHE_HEADER).unwrap(),
        "MISS"
    );

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["product"]["code"], "123");
    assert_eq!(json["data"]["product"]["name"], "Rain Jacket");
    assert_eq!(json["data"]["shop"]["reviewCount"], 1200);
    assert_eq!(json["data"]["metadata"]["cached"], false);
    assert!(!json["data"]["answer"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_qa_repeat_hits_cache() {
    let generator = Arc::new(MockGenerator::returning(
        "Uit reviews blijkt dat de jas waterdicht is: 9/10.",
    ));
    let router = router_with(stocked_source(), generator);

    let first = post_qa(&router, qa_body("t1", Some("123"), "Is it waterproof?")).await;
    assert_eq!(first.headers().get(REVQ_CACHE_HEADER).unwrap(), "MISS");

    let second = post_qa(&router, qa_body("t1", Some("123"), "is it WATERPROOF?")).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get(REVQ_CACHE_HEADER).unwrap(), "HIT");

    let json = body_json(second).await;
    assert_eq!(json["data"]["metadata"]["cached"], true);
}

#[tokio::test]
async fn test_qa_empty_question_is_rejected() {
    let router = router_with(stocked_source(), Arc::new(StubGenerator));

    let response = post_qa(&router, qa_body("t1", Some("123"), "   ")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("question"));
}

#[tokio::test]
async fn test_qa_unknown_tenant() {
    let router = router_with(stocked_source(), Arc::new(StubGenerator));

    let response = post_qa(&router, qa_body("nobody", Some("123"), "Is it waterproof?")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_qa_without_any_product_signal() {
    let router = router_with(MockReviewSource::new(), Arc::new(StubGenerator));

    let response = post_qa(&router, qa_body("t1", None, "Is it waterproof?")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(REVQ_CACHE_HEADER).unwrap(),
        "not_answerable"
    );
}

#[tokio::test]
async fn test_qa_provider_quota_maps_to_503() {
    let generator = Arc::new(MockGenerator::failing(|| GenerateError::Quota {
        message: "exhausted".to_string(),
    }));
    let router = router_with(stocked_source(), generator);

    let response = post_qa(&router, qa_body("t1", Some("123"), "Is it waterproof?")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_qa_provider_auth_maps_to_401() {
    let generator = Arc::new(MockGenerator::failing(|| GenerateError::Auth {
        message: "bad key".to_string(),
    }));
    let router = router_with(stocked_source(), generator);

    let response = post_qa(&router, qa_body("t1", Some("123"), "Is it waterproof?")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_popular_questions_after_answering() {
    let router = router_with(stocked_source(), Arc::new(StubGenerator));

    post_qa(&router, qa_body("t1", Some("123"), "Is it waterproof?")).await;

    // The counter increment is fire-and-forget.
    for attempt in 0..100 {
        let response = get(&router, "/v1/qa/popular/t1?limit=5").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let questions = json["data"]["questions"].as_array().unwrap().clone();
        if questions
            .iter()
            .any(|q| q["question"] == "Is it waterproof?")
        {
            return;
        }

        assert!(attempt < 99, "question never appeared in the popular list");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_history_after_answering() {
    let router = router_with(stocked_source(), Arc::new(StubGenerator));

    post_qa(&router, qa_body("t1", Some("123"), "Is it waterproof?")).await;

    // The history write is fire-and-forget.
    for attempt in 0..100 {
        let response = get(&router, "/v1/qa/history/123").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["productCode"], "123");

        let history = json["data"]["qaHistory"].as_array().unwrap().clone();
        if !history.is_empty() {
            assert_eq!(history[0]["question"], "Is it waterproof?");
            assert!(history[0]["confidence"].is_string());
            return;
        }

        assert!(attempt < 99, "history entry never appeared");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_shop_rating() {
    let router = router_with(stocked_source(), Arc::new(StubGenerator));

    let response = get(&router, "/v1/shop/t1/rating").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["reviewCount"], 1200);
    assert_eq!(json["data"]["recommendationPercentage"], 96.0);
}

#[tokio::test]
async fn test_shop_rating_unknown_tenant() {
    let router = router_with(stocked_source(), Arc::new(StubGenerator));

    let response = get(&router, "/v1/shop/nobody/rating").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
