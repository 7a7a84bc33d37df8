use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    fuzzy_name_match, ProductQuery, ProductReviews, ProviderCredentials, ReviewSource, ShopReviews,
};

/// In-memory review source for tests.
///
/// Serves canned results and records how it was queried, so tests can assert
/// both the returned data and the call pattern (e.g. that a cache hit made no
/// provider call).
#[derive(Default, Clone)]
pub struct MockReviewSource {
    by_code: Arc<Mutex<Vec<(String, ProductReviews)>>>,
    shop: Arc<Mutex<ShopReviews>>,
    product_calls: Arc<AtomicUsize>,
    shop_calls: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<ProductQuery>>>,
}

impl MockReviewSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the result served for a product code.
    pub fn with_product(self, code: &str, reviews: ProductReviews) -> Self {
        self.by_code.lock().push((code.to_string(), reviews));
        self
    }

    /// Sets the shop-level aggregates.
    pub fn with_shop(self, shop: ShopReviews) -> Self {
        *self.shop.lock() = shop;
        self
    }

    /// Number of product review lookups performed.
    pub fn product_call_count(&self) -> usize {
        self.product_calls.load(Ordering::SeqCst)
    }

    /// Number of shop review lookups performed.
    pub fn shop_call_count(&self) -> usize {
        self.shop_calls.load(Ordering::SeqCst)
    }

    /// The most recent product query, if any.
    pub fn last_query(&self) -> Option<ProductQuery> {
        self.last_query.lock().clone()
    }
}

#[async_trait]
impl ReviewSource for MockReviewSource {
    async fn product_reviews(
        &self,
        _creds: &ProviderCredentials,
        query: &ProductQuery,
    ) -> ProductReviews {
        self.product_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock() = Some(query.clone());

        let registered = self.by_code.lock();

        if let Some(code) = query.code.as_deref() {
            if let Some((_, reviews)) = registered.iter().find(|(c, _)| c == code) {
                return reviews.clone();
            }
        }

        if let Some(name) = query.name.as_deref() {
            if let Some((_, reviews)) = registered.iter().find(|(_, r)| {
                r.product_name
                    .as_deref()
                    .is_some_and(|candidate| fuzzy_name_match(name, candidate))
            }) {
                return reviews.clone();
            }
        }

        ProductReviews::default()
    }

    async fn shop_reviews(&self, _creds: &ProviderCredentials) -> ShopReviews {
        self.shop_calls.fetch_add(1, Ordering::SeqCst);
        self.shop.lock().clone()
    }
}
