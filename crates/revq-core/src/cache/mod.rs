//! Answer cache and popularity counters.
//!
//! The gateway fronts two seams: [`CacheBackend`] for TTL'd answer storage
//! and [`CounterStore`] for question popularity. Both default to in-process
//! implementations; the traits are where a networked store would plug in.
//!
//! Failure policy: a broken backend degrades reads to a miss and writes to a
//! no-op. Cache trouble is logged, never surfaced to the request.
//!
//! Known limitation: there is no request coalescing. Concurrent identical
//! misses each run the full downstream pipeline and race to write the same
//! entry; last write wins, which is harmless because the entries are
//! equivalent.

pub mod error;


pub use error::CacheError;

use async_trait::async_trait;
use moka::sync::Cache;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::hashing::question_hash;
use crate::response::QAResponse;

/// Raw key/value answer storage with per-entry TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// Popularity counters, keyed per tenant and product, one counter per
/// distinct question text.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(
        &self,
        tenant_id: &str,
        product_code: &str,
        question: &str,
    ) -> Result<(), CacheError>;

    /// Counters aggregated across all of a tenant's products. Identical
    /// question text merges even when stored under different products.
    /// Sorted by count descending; ties keep first-seen order.
    async fn popular(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<PopularQuestion>, CacheError>;
}

/// One entry of the popular-questions list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularQuestion {
    pub question: String,
    pub count: u64,
}

/// In-process answer cache backed by moka.
pub struct MokaCacheBackend {
    // Entries carry their own deadline: moka's cache-wide TTL cannot vary
    // per entry, and the gateway's TTL is configurable.
    entries: Cache<String, (String, Instant)>,
}

impl MokaCacheBackend {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::new(capacity),
        }
    }
}

#[async_trait]
impl CacheBackend for MokaCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.entries.get(key) {
            Some((value, deadline)) if Instant::now() < deadline => Ok(Some(value)),
            Some(_) => {
                self.entries.invalidate(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }
}

#[derive(Default)]
struct CounterBucket {
    product_code: String,
    // Insertion order preserved so popularity ties stay deterministic.
    entries: Vec<(String, u64)>,
}

/// In-process counter store.
#[derive(Default)]
pub struct MemoryCounterStore {
    tenants: RwLock<HashMap<String, Vec<CounterBucket>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        tenant_id: &str,
        product_code: &str,
        question: &str,
    ) -> Result<(), CacheError> {
        let mut tenants = self.tenants.write();
        let buckets = tenants.entry(tenant_id.to_string()).or_default();

        let bucket = match buckets.iter_mut().find(|b| b.product_code == product_code) {
            Some(bucket) => bucket,
            None => {
                buckets.push(CounterBucket {
                    product_code: product_code.to_string(),
                    entries: Vec::new(),
                });
                buckets.last_mut().expect("just pushed")
            }
        };

        match bucket.entries.iter_mut().find(|(q, _)| q == question) {
            Some((_, count)) => *count += 1,
            None => bucket.entries.push((question.to_string(), 1)),
        }

        Ok(())
    }

    async fn popular(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<PopularQuestion>, CacheError> {
        let tenants = self.tenants.read();
        let Some(buckets) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        // Merge identical question text across products, first-seen order.
        let mut merged: Vec<PopularQuestion> = Vec::new();
        for bucket in buckets {
            for (question, count) in &bucket.entries {
                match merged.iter_mut().find(|p| &p.question == question) {
                    Some(entry) => entry.count += count,
                    None => merged.push(PopularQuestion {
                        question: question.clone(),
                        count: *count,
                    }),
                }
            }
        }

        merged.sort_by(|a, b| b.count.cmp(&a.count));
        merged.truncate(limit);
        Ok(merged)
    }
}

/// Backend that fails every operation. Exercises the degrade paths.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone, Default)]
pub struct FailingCacheBackend;

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl CacheBackend for FailingCacheBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable {
            message: "injected failure".to_string(),
        })
    }

    async fn put(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable {
            message: "injected failure".to_string(),
        })
    }
}

/// Front door for cached answers and popularity counters.
#[derive(Clone)]
pub struct CacheGateway {
    backend: Arc<dyn CacheBackend>,
    counters: Arc<dyn CounterStore>,
    answer_ttl: Duration,
}

impl CacheGateway {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        counters: Arc<dyn CounterStore>,
        answer_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            counters,
            answer_ttl,
        }
    }

    /// Convenience constructor with the in-process defaults.
    pub fn in_memory(capacity: u64, answer_ttl: Duration) -> Self {
        Self::new(
            Arc::new(MokaCacheBackend::new(capacity)),
            Arc::new(MemoryCounterStore::new()),
            answer_ttl,
        )
    }

    fn answer_key(product_code: &str, question: &str) -> String {
        format!("qa:{}:{}", product_code, question_hash(question))
    }

    /// Looks up a cached answer. Any backend or decode failure is a miss.
    pub async fn get_answer(&self, product_code: &str, question: &str) -> Option<QAResponse> {
        let key = Self::answer_key(product_code, question);

        let raw = match self.backend.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "answer cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(key, error = %e, "cached answer undecodable, treating as miss");
                None
            }
        }
    }

    /// Stores an answer under the normalized question key. Best effort.
    pub async fn put_answer(&self, product_code: &str, question: &str, response: &QAResponse) {
        let key = Self::answer_key(product_code, question);

        let payload = match serde_json::to_string(response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize answer for cache");
                return;
            }
        };

        if let Err(e) = self.backend.put(&key, payload, self.answer_ttl).await {
            warn!(key, error = %e, "answer cache write failed");
        }
    }

    /// Bumps the popularity counter for a question. Best effort.
    pub async fn increment_question_count(
        &self,
        tenant_id: &str,
        product_code: &str,
        question: &str,
    ) {
        if let Err(e) = self
            .counters
            .increment(tenant_id, product_code, question)
            .await
        {
            warn!(tenant_id, error = %e, "question counter increment failed");
        }
    }

    /// The tenant's most-asked questions. A failing store yields an empty
    /// list.
    pub async fn popular_questions(&self, tenant_id: &str, limit: usize) -> Vec<PopularQuestion> {
        match self.counters.popular(tenant_id, limit).await {
            Ok(questions) => questions,
            Err(e) => {
                warn!(tenant_id, error = %e, "popular questions lookup failed");
                Vec::new()
            }
        }
    }
}
