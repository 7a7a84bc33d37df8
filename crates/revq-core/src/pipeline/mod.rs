//! Question-answering orchestration.
//!
//! One entry point, [`Pipeline::answer`]: resolve the product, try the
//! cache, fetch product and shop reviews concurrently, rank, assemble the
//! prompt, generate, then write back to the cache and spawn the best-effort
//! persistence work. Adapters are injected so tests run the whole flow
//! against fakes.

pub mod error;


pub use error::PipelineError;

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::CacheGateway;
use crate::generate::{generate_and_score, AnswerGenerator, ScoringConfig};
use crate::hashing::question_hash;
use crate::prompt::{build_prompt, PromptInputs};
use crate::ranking::{rank, RankingConfig, EVIDENCE_LIMIT, EXCERPT_LIMIT};
use crate::request::QARequest;
use crate::resolver::{self, Resolution};
use crate::response::{
    CacheStatus, ProductSummary, QAResponse, ResponseMeta, ReviewExcerpt, ShopSummary,
};
use crate::reviews::{ProductQuery, ProviderCredentials, ReviewSource};
use crate::scrape::PageScraper;
use crate::store::{AnalyticsEvent, QaRecord, QaStore};

/// Caller metadata recorded with analytics events.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// The assembled question-answering pipeline.
pub struct Pipeline {
    reviews: Arc<dyn ReviewSource>,
    scraper: Arc<dyn PageScraper>,
    generator: Arc<dyn AnswerGenerator>,
    store: Arc<dyn QaStore>,
    cache: CacheGateway,
    ranking: RankingConfig,
}

impl Pipeline {
    pub fn new(
        reviews: Arc<dyn ReviewSource>,
        scraper: Arc<dyn PageScraper>,
        generator: Arc<dyn AnswerGenerator>,
        store: Arc<dyn QaStore>,
        cache: CacheGateway,
        ranking: RankingConfig,
    ) -> Self {
        Self {
            reviews,
            scraper,
            generator,
            store,
            cache,
            ranking,
        }
    }

    /// Cache gateway, exposed for the popular-questions endpoint.
    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    /// Persistence sink, exposed for the history endpoint.
    pub fn store(&self) -> &Arc<dyn QaStore> {
        &self.store
    }

    /// Review source, exposed for the shop-rating endpoint.
    pub fn reviews(&self) -> &Arc<dyn ReviewSource> {
        &self.reviews
    }

    /// Answers one validated question.
    pub async fn answer(
        &self,
        request: &QARequest,
        api_token: &str,
        meta: RequestMeta,
    ) -> Result<(QAResponse, CacheStatus), PipelineError> {
        let started = Instant::now();

        let resolution = resolver::resolve(request, self.scraper.as_ref()).await;
        debug!(identifier = ?resolution.identifier, "resolved product identifier");

        if let Some(code) = resolution.identifier.code.clone() {
            if let Some(mut cached) = self.cache.get_answer(&code, &request.question).await {
                info!(code, "serving cached answer");
                cached.metadata.cached = true;
                cached.metadata.response_time_ms = started.elapsed().as_millis() as u64;

                self.spawn_analytics(AnalyticsEvent {
                    tenant_id: request.tenant_id.clone(),
                    product_code: Some(code),
                    question: request.question.clone(),
                    answered: true,
                    cached: true,
                    response_time_ms: cached.metadata.response_time_ms,
                    error: None,
                    ip_address: meta.ip_address,
                    user_agent: meta.user_agent,
                });

                return Ok((cached, CacheStatus::Hit));
            }
        }

        let context_usable = resolution
            .context
            .as_ref()
            .is_some_and(|c| c.is_usable());

        // Nothing to look up and nothing to ground an answer on.
        if resolution.identifier.is_empty() && !context_usable {
            self.log_failure(request, &resolution, &meta, started, "no product signal");
            return Err(PipelineError::NotAnswerable);
        }

        let creds = ProviderCredentials {
            location_id: request.tenant_id.clone(),
            api_token: api_token.to_string(),
        };
        let query = ProductQuery {
            code: resolution.identifier.code.clone(),
            name: resolution.identifier.name.clone(),
        };

        let (product, shop) = tokio::join!(
            self.reviews.product_reviews(&creds, &query),
            self.reviews.shop_reviews(&creds)
        );

        if product.is_empty() && !context_usable {
            self.log_failure(request, &resolution, &meta, started, "no reviews and no context");
            return Err(PipelineError::NotAnswerable);
        }

        let ranked = rank(&product.reviews, &request.question, Utc::now(), &self.ranking);
        let evidence = &ranked[..ranked.len().min(EVIDENCE_LIMIT)];

        let product_name = product
            .product_name
            .clone()
            .or_else(|| resolution.identifier.name.clone());

        let shop_summary = if shop.average_rating.is_some() || shop.review_count > 0 {
            Some(ShopSummary {
                rating: shop.average_rating,
                review_count: shop.review_count,
                recommendation_percentage: shop.recommendation_percentage,
            })
        } else {
            None
        };

        let prompt = build_prompt(&PromptInputs {
            product_code: resolution.identifier.code.as_deref(),
            product_name: product_name.as_deref(),
            average_rating: product.average_rating,
            review_count: product.review_count,
            shop: shop_summary.as_ref().map(|_| &shop),
            reviews: evidence,
            question: &request.question,
            language: request.language,
            context: resolution.context.as_ref(),
        });

        let scoring = ScoringConfig::for_language(request.language);
        let generated = match generate_and_score(self.generator.as_ref(), &prompt, &scoring).await
        {
            Ok(generated) => generated,
            Err(e) => {
                self.log_failure(request, &resolution, &meta, started, &e.to_string());
                return Err(e.into());
            }
        };

        let excerpts: Vec<ReviewExcerpt> = ranked
            .iter()
            .take(EXCERPT_LIMIT)
            .map(|r| ReviewExcerpt {
                rating: r.review.rating,
                excerpt: r.review.excerpt_text().to_string(),
                author: r.review.author.clone(),
                date: r.review.date,
            })
            .collect();

        let response = QAResponse {
            question: request.question.clone(),
            answer: generated.answer.clone(),
            confidence: generated.confidence,
            product: ProductSummary {
                code: resolution.identifier.code.clone(),
                name: product_name,
                rating: product.average_rating,
                review_count: product.review_count,
            },
            shop: shop_summary,
            relevant_reviews: excerpts,
            metadata: ResponseMeta {
                answered_at: Utc::now(),
                cached: false,
                approx_tokens: generated.approx_tokens,
                response_time_ms: started.elapsed().as_millis() as u64,
            },
        };

        if let Some(code) = resolution.identifier.code.clone() {
            self.cache
                .put_answer(&code, &request.question, &response)
                .await;

            self.spawn_qa_record(QaRecord {
                tenant_id: request.tenant_id.clone(),
                product_code: code.clone(),
                question: request.question.clone(),
                question_hash: question_hash(&request.question),
                answer: generated.answer,
                confidence: generated.confidence,
                language: request.language,
                approx_tokens: generated.approx_tokens,
            });

            let cache = self.cache.clone();
            let tenant = request.tenant_id.clone();
            let question = request.question.clone();
            tokio::spawn(async move {
                cache.increment_question_count(&tenant, &code, &question).await;
            });
        }

        self.spawn_analytics(AnalyticsEvent {
            tenant_id: request.tenant_id.clone(),
            product_code: resolution.identifier.code.clone(),
            question: request.question.clone(),
            answered: true,
            cached: false,
            response_time_ms: response.metadata.response_time_ms,
            error: None,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
        });

        Ok((response, CacheStatus::Miss))
    }

    fn log_failure(
        &self,
        request: &QARequest,
        resolution: &Resolution,
        meta: &RequestMeta,
        started: Instant,
        error: &str,
    ) {
        self.spawn_analytics(AnalyticsEvent {
            tenant_id: request.tenant_id.clone(),
            product_code: resolution.identifier.code.clone(),
            question: request.question.clone(),
            answered: false,
            cached: false,
            response_time_ms: started.elapsed().as_millis() as u64,
            error: Some(error.to_string()),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        });
    }

    fn spawn_analytics(&self, event: AnalyticsEvent) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.log_event(&event).await {
                warn!(error = %e, "analytics write failed");
            }
        });
    }

    fn spawn_qa_record(&self, record: QaRecord) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.save_qa(&record).await {
                warn!(error = %e, "qa history write failed");
            }
        });
    }
}
