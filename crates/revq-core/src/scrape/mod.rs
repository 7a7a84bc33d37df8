//! On-demand product page scraping.
//!
//! Last-resort context source: when a request carries no product signal at
//! all but does carry the page URL, the resolver fetches the page and pulls
//! whatever structured data it can find. Extraction priority:
//!
//! 1. JSON-LD `Product` blocks (name, description, sku, product id, gtin)
//! 2. `<title>` and meta description
//! 3. Open Graph title/description
//!
//! Scraping never fails the request. Anything that goes wrong yields `None`.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::request::ScrapedContext;

const USER_AGENT: &str = "revq-bot/1.0";

/// Fetches a product page and extracts context from it.
#[async_trait]
pub trait PageScraper: Send + Sync {
    /// Returns `None` when the page is unreachable or carries nothing usable.
    async fn scrape(&self, url: &str) -> Option<ScrapedContext>;
}

/// reqwest-backed [`PageScraper`].
#[derive(Debug, Clone)]
pub struct HttpPageScraper {
    client: reqwest::Client,
}

impl HttpPageScraper {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self { client }
    }
}

#[async_trait]
impl PageScraper for HttpPageScraper {
    async fn scrape(&self, url: &str) -> Option<ScrapedContext> {
        if url.trim().is_empty() {
            return None;
        }

        debug!(url, "scraping product page");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "page fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "page fetch returned error status");
            return None;
        }

        let html = response.text().await.ok()?;
        extract_context(&html)
    }
}

/// Scraper that never finds anything. Used when scraping is disabled.
#[derive(Debug, Clone, Default)]
pub struct NoopScraper;

#[async_trait]
impl PageScraper for NoopScraper {
    async fn scrape(&self, _url: &str) -> Option<ScrapedContext> {
        None
    }
}

/// Scraper serving a canned context, recording the URLs it was asked for.
#[cfg(any(test, feature = "mock"))]
#[derive(Default, Clone)]
pub struct MockPageScraper {
    context: Option<ScrapedContext>,
    calls: std::sync::Arc<parking_lot::Mutex<Vec<String>>>,
}

#[cfg(any(test, feature = "mock"))]
impl MockPageScraper {
    pub fn returning(context: ScrapedContext) -> Self {
        Self {
            context: Some(context),
            calls: Default::default(),
        }
    }

    pub fn scraped_urls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl PageScraper for MockPageScraper {
    async fn scrape(&self, url: &str) -> Option<ScrapedContext> {
        self.calls.lock().push(url.to_string());
        self.context.clone()
    }
}

static JSON_LD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type=["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>([^<]+)</title>").expect("valid regex"));

static META_DESC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*name=["']description["'][^>]*content=["']([^"']+)["']"#)
        .expect("valid regex")
});

// Attribute order is not guaranteed; some pages put content before name.
static META_DESC_REVERSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*content=["']([^"']+)["'][^>]*name=["']description["']"#)
        .expect("valid regex")
});

static OG_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*property=["']og:title["'][^>]*content=["']([^"']+)["']"#)
        .expect("valid regex")
});

static OG_DESC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*property=["']og:description["'][^>]*content=["']([^"']+)["']"#)
        .expect("valid regex")
});

/// Extracts product context from raw HTML.
///
/// Pure and infallible; returns `None` when neither a name, a description,
/// nor an identifier could be found.
pub fn extract_context(html: &str) -> Option<ScrapedContext> {
    let mut context = extract_json_ld(html).unwrap_or_default();

    if context.name.is_none() {
        context.name = TITLE_RE
            .captures(html)
            .map(|c| decode_entities(c[1].trim()))
            .or_else(|| {
                OG_TITLE_RE
                    .captures(html)
                    .map(|c| decode_entities(c[1].trim()))
            })
            .filter(|s| !s.is_empty());
    }

    if context.description.is_none() {
        context.description = META_DESC_RE
            .captures(html)
            .or_else(|| META_DESC_REVERSED_RE.captures(html))
            .or_else(|| OG_DESC_RE.captures(html))
            .map(|c| decode_entities(c[1].trim()))
            .filter(|s| !s.is_empty());
    }

    if context.is_usable() || context.has_identifier() {
        Some(context)
    } else {
        None
    }
}

/// Walks every JSON-LD block looking for a `Product` node.
fn extract_json_ld(html: &str) -> Option<ScrapedContext> {
    for capture in JSON_LD_RE.captures_iter(html) {
        let Ok(data) = serde_json::from_str::<serde_json::Value>(capture[1].trim()) else {
            continue;
        };

        if let Some(product) = find_product_node(&data) {
            return Some(product_node_to_context(product));
        }
    }

    None
}

/// Finds the first `@type: Product` object, looking through top-level
/// arrays and `@graph` containers.
fn find_product_node(data: &serde_json::Value) -> Option<&serde_json::Value> {
    match data {
        serde_json::Value::Object(map) => {
            if map.get("@type").and_then(|t| t.as_str()) == Some("Product") {
                return Some(data);
            }
            if let Some(graph) = map.get("@graph") {
                return find_product_node(graph);
            }
            None
        }
        serde_json::Value::Array(items) => items.iter().find_map(find_product_node),
        _ => None,
    }
}

fn product_node_to_context(node: &serde_json::Value) -> ScrapedContext {
    let text = |key: &str| {
        node.get(key)
            .and_then(value_to_string)
            .map(|s| decode_entities(s.trim()))
            .filter(|s| !s.is_empty())
    };

    let gtin = ["gtin", "gtin13", "gtin12", "gtin14", "gtin8", "ean"]
        .iter()
        .find_map(|key| text(key));

    ScrapedContext {
        name: text("name"),
        description: text("description"),
        product_id: text("productID"),
        gtin,
        sku: text("sku"),
        specs: Default::default(),
        attributes: Default::default(),
    }
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decodes the handful of HTML entities that actually show up in product
/// titles and descriptions.
pub fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_ld_product_takes_priority() {
        let html = r#"
            <html><head>
            <title>Fallback Title</title>
            <script type="application/ld+json">
            {"@type": "Product", "name": "Rain Jacket", "description": "Waterproof shell",
             "sku": "AB1", "productID": "P-77", "gtin13": "8712345678906"}
            </script>
            </head></html>
        "#;

        let context = extract_context(html).expect("should extract");
        assert_eq!(context.name.as_deref(), Some("Rain Jacket"));
        assert_eq!(context.description.as_deref(), Some("Waterproof shell"));
        assert_eq!(context.sku.as_deref(), Some("AB1"));
        assert_eq!(context.product_id.as_deref(), Some("P-77"));
        assert_eq!(context.gtin.as_deref(), Some("8712345678906"));
    }

    #[test]
    fn test_json_ld_inside_graph() {
        let html = r#"
            <script type="application/ld+json">
            {"@context": "https://schema.org",
             "@graph": [
                {"@type": "WebPage", "name": "ignored"},
                {"@type": "Product", "name": "Desk Lamp", "sku": "DL-9"}
             ]}
            </script>
        "#;

        let context = extract_context(html).expect("should extract");
        assert_eq!(context.name.as_deref(), Some("Desk Lamp"));
        assert_eq!(context.sku.as_deref(), Some("DL-9"));
    }

    #[test]
    fn test_title_and_meta_description_fallback() {
        let html = r#"
            <html><head>
            <title>  Desk Lamp Deluxe </title>
            <meta name="description" content="A bright lamp for dark desks">
            </head></html>
        "#;

        let context = extract_context(html).expect("should extract");
        assert_eq!(context.name.as_deref(), Some("Desk Lamp Deluxe"));
        assert_eq!(
            context.description.as_deref(),
            Some("A bright lamp for dark desks")
        );
        assert!(!context.has_identifier());
    }

    #[test]
    fn test_meta_description_reversed_attribute_order() {
        let html = r#"<meta content="Reversed order works" name="description">"#;
        let context = extract_context(html).expect("should extract");
        assert_eq!(context.description.as_deref(), Some("Reversed order works"));
    }

    #[test]
    fn test_open_graph_fallback() {
        let html = r#"
            <meta property="og:title" content="OG Lamp">
            <meta property="og:description" content="Seen on social media">
        "#;

        let context = extract_context(html).expect("should extract");
        assert_eq!(context.name.as_deref(), Some("OG Lamp"));
        assert_eq!(context.description.as_deref(), Some("Seen on social media"));
    }

    #[test]
    fn test_entities_are_decoded() {
        let html = r#"<title>Tom &amp; Jerry&#39;s &quot;Lamp&quot;</title>"#;
        let context = extract_context(html).expect("should extract");
        assert_eq!(context.name.as_deref(), Some(r#"Tom & Jerry's "Lamp""#));
    }

    #[test]
    fn test_nothing_usable_returns_none() {
        assert!(extract_context("<html><body>hello</body></html>").is_none());
        assert!(extract_context("").is_none());
    }

    #[test]
    fn test_malformed_json_ld_falls_through() {
        let html = r#"
            <script type="application/ld+json">{not json</script>
            <title>Still Works</title>
        "#;

        let context = extract_context(html).expect("should extract");
        assert_eq!(context.name.as_deref(), Some("Still Works"));
    }

    #[tokio::test]
    async fn test_noop_scraper_finds_nothing() {
        assert!(NoopScraper.scrape("https://example.com/p/1").await.is_none());
    }
}
