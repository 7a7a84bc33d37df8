//! Identifier resolution.
//!
//! Upstream integrations disagree about where the product identifier lives:
//! a plain code string, a malformed object from older widget builds, a typed
//! page-detection result, or scraped context. The resolver flattens all of
//! that into one canonical [`ProductIdentifier`] using a fixed priority
//! order, so the same request always resolves to the same identifier.

use tracing::debug;

use crate::request::{IdentifierKind, QARequest, RawProductRef, ScrapedContext};
use crate::scrape::PageScraper;

/// Canonical product identity after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductIdentifier {
    /// Stable code usable for provider queries and cache keys.
    pub code: Option<String>,
    /// Display name, also the fuzzy-match fallback when no code exists.
    pub name: Option<String>,
}

impl ProductIdentifier {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.name.is_none()
    }
}

/// Resolution result: the identifier plus the context it was derived from
/// (including anything a fallback scrape pulled in).
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub identifier: ProductIdentifier,
    pub context: Option<ScrapedContext>,
}

/// Resolves the canonical product identifier for a request.
///
/// When the request carries no code-like signal at all but does carry a
/// source URL, the product page is scraped first to populate context.
/// Scrape failures are swallowed; resolution proceeds with whatever was
/// available before the attempt.
pub async fn resolve(request: &QARequest, scraper: &dyn PageScraper) -> Resolution {
    let mut context = request.product_context.clone();

    if !has_code_signal(request) {
        if let Some(url) = request.source_url.as_deref().filter(|u| !u.trim().is_empty()) {
            debug!(url, "no product signal in request, scraping page");
            if let Some(scraped) = scraper.scrape(url).await {
                context = Some(match context {
                    Some(existing) => merge_context(existing, scraped),
                    None => scraped,
                });
            }
        }
    }

    let code = resolve_code(request, context.as_ref());
    let name = resolve_name(request, context.as_ref());

    Resolution {
        identifier: ProductIdentifier { code, name },
        context,
    }
}

/// Priority order, first non-empty wins.
fn resolve_code(request: &QARequest, context: Option<&ScrapedContext>) -> Option<String> {
    // 1. Explicit plain-string code.
    // 2. Code buried in a malformed object.
    match &request.product_code {
        Some(RawProductRef::Code(code)) => {
            let code = code.trim();
            if !code.is_empty() {
                return Some(code.to_string());
            }
        }
        Some(RawProductRef::Object(map)) => {
            if let Some(code) = extract_object_code(map) {
                return Some(code);
            }
        }
        None => {}
    }

    // 3. Typed gtin from page detection, when plausible.
    if let Some(ident) = &request.identifier {
        if ident.kind == IdentifierKind::Gtin {
            if let Some(gtin) = plausible_gtin(&ident.value) {
                return Some(gtin);
            }
        }
    }

    // 4. Identifiers from scraped context: product id, gtin, sku.
    if let Some(ctx) = context {
        if let Some(id) = nonempty(ctx.product_id.as_deref()) {
            return Some(id);
        }
        if let Some(gtin) = ctx.gtin.as_deref().and_then(plausible_gtin) {
            return Some(gtin);
        }
        if let Some(sku) = nonempty(ctx.sku.as_deref()) {
            return Some(sku);
        }
    }

    None
}

fn resolve_name(request: &QARequest, context: Option<&ScrapedContext>) -> Option<String> {
    if let Some(ident) = &request.identifier {
        if ident.kind == IdentifierKind::Name {
            if let Some(name) = nonempty(Some(&ident.value)) {
                return Some(name);
            }
        }
    }

    context.and_then(|ctx| nonempty(ctx.name.as_deref()))
}

/// Whether the request already carries anything resolvable to a code.
fn has_code_signal(request: &QARequest) -> bool {
    match &request.product_code {
        Some(RawProductRef::Code(code)) if !code.trim().is_empty() => return true,
        Some(RawProductRef::Object(map)) if extract_object_code(map).is_some() => return true,
        _ => {}
    }

    if let Some(ident) = &request.identifier {
        if ident.kind == IdentifierKind::Gtin && plausible_gtin(&ident.value).is_some() {
            return true;
        }
    }

    request
        .product_context
        .as_ref()
        .is_some_and(ScrapedContext::has_identifier)
}

/// Pulls a code out of a malformed product-code object.
fn extract_object_code(map: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    for key in ["value", "code", "sku", "gtin"] {
        if let Some(code) = map.get(key).and_then(|v| v.as_str()) {
            let code = code.trim();
            if !code.is_empty() {
                return Some(code.to_string());
            }
        }
    }
    None
}

/// GTIN plausibility: 8 to 14 digits once separators are stripped.
/// Returns the canonical digits-only form.
fn plausible_gtin(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if (8..=14).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

pub(crate) fn nonempty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn merge_context(existing: ScrapedContext, scraped: ScrapedContext) -> ScrapedContext {
    ScrapedContext {
        name: existing.name.or(scraped.name),
        description: existing.description.or(scraped.description),
        product_id: existing.product_id.or(scraped.product_id),
        gtin: existing.gtin.or(scraped.gtin),
        sku: existing.sku.or(scraped.sku),
        specs: if existing.specs.is_empty() {
            scraped.specs
        } else {
            existing.specs
        },
        attributes: if existing.attributes.is_empty() {
            scraped.attributes
        } else {
            existing.attributes
        },
    }
}
