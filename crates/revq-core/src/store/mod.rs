//! Q&A history and analytics persistence.
//!
//! Writes are best-effort: the pipeline spawns them after the response
//! exists, logs failures, and never lets them touch the response path. The
//! read side backs the history endpoint, where a failure does surface (the
//! endpoint has no other content to serve).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::generate::Confidence;
use crate::request::Language;

/// One stored question/answer pair.
#[derive(Debug, Clone)]
pub struct QaRecord {
    pub tenant_id: String,
    pub product_code: String,
    pub question: String,
    pub question_hash: String,
    pub answer: String,
    pub confidence: Confidence,
    pub language: Language,
    pub approx_tokens: usize,
}

/// One append-only analytics record per request attempt, including failures.
#[derive(Debug, Clone)]
pub struct AnalyticsEvent {
    pub tenant_id: String,
    pub product_code: Option<String>,
    pub question: String,
    pub answered: bool,
    pub cached: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A past answer, as served by the history endpoint.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QaHistoryEntry {
    pub question: String,
    pub answer: String,
    pub confidence: String,
    pub created_at: DateTime<Utc>,
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence sink for Q&A pairs and analytics.
#[async_trait]
pub trait QaStore: Send + Sync {
    async fn save_qa(&self, record: &QaRecord) -> Result<(), StoreError>;
    async fn log_event(&self, event: &AnalyticsEvent) -> Result<(), StoreError>;

    /// Most recent answers for a product, newest first.
    async fn history(
        &self,
        product_code: &str,
        limit: i64,
    ) -> Result<Vec<QaHistoryEntry>, StoreError>;
}

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, shared with other Postgres-backed adapters.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QaStore for PgStore {
    async fn save_qa(&self, record: &QaRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO qa_pairs \
             (tenant_id, product_code, question, question_hash, answer, confidence, language, approx_tokens, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())",
        )
        .bind(&record.tenant_id)
        .bind(&record.product_code)
        .bind(&record.question)
        .bind(&record.question_hash)
        .bind(&record.answer)
        .bind(record.confidence.as_str())
        .bind(record.language.code())
        .bind(record.approx_tokens as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn log_event(&self, event: &AnalyticsEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO analytics_events \
             (tenant_id, product_code, question, answered, cached, response_time_ms, error, ip_address, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())",
        )
        .bind(&event.tenant_id)
        .bind(&event.product_code)
        .bind(&event.question)
        .bind(event.answered)
        .bind(event.cached)
        .bind(event.response_time_ms as i64)
        .bind(&event.error)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(
        &self,
        product_code: &str,
        limit: i64,
    ) -> Result<Vec<QaHistoryEntry>, StoreError> {
        let entries = sqlx::query_as(
            "SELECT question, answer, confidence, created_at \
             FROM qa_pairs WHERE product_code = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(product_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

/// In-memory store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    qa: Mutex<Vec<QaRecord>>,
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved_qa(&self) -> Vec<QaRecord> {
        self.qa.lock().clone()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl QaStore for MemoryStore {
    async fn save_qa(&self, record: &QaRecord) -> Result<(), StoreError> {
        self.qa.lock().push(record.clone());
        Ok(())
    }

    async fn log_event(&self, event: &AnalyticsEvent) -> Result<(), StoreError> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    async fn history(
        &self,
        product_code: &str,
        limit: i64,
    ) -> Result<Vec<QaHistoryEntry>, StoreError> {
        let qa = self.qa.lock();
        let entries = qa
            .iter()
            .rev()
            .filter(|r| r.product_code == product_code)
            .take(limit.max(0) as usize)
            .map(|r| QaHistoryEntry {
                question: r.question.clone(),
                answer: r.answer.clone(),
                confidence: r.confidence.as_str().to_string(),
                created_at: Utc::now(),
            })
            .collect();
        Ok(entries)
    }
}
