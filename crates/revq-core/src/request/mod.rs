//! Inbound request model.
//!
//! The widget and its legacy integrations send product references in several
//! shapes: a plain code string, a malformed object carrying the code in a
//! sub-field, a typed identifier detected on the page, or nothing at all.
//! Everything is modeled explicitly here and funneled through
//! [`crate::resolver`] into one canonical identifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Maximum accepted question length, enforced at the HTTP boundary.
pub const MAX_QUESTION_CHARS: usize = 500;

/// A validated question-answering request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QARequest {
    /// Tenant (shop location) identifier.
    pub tenant_id: String,

    /// Product code as supplied by the integration. May be a plain string or
    /// a malformed object from older widget builds.
    #[serde(default)]
    pub product_code: Option<RawProductRef>,

    /// Identifier detected on the product page, if any.
    #[serde(default)]
    pub identifier: Option<TypedIdentifier>,

    /// Product context scraped client-side, if any.
    #[serde(default)]
    pub product_context: Option<ScrapedContext>,

    /// The shopper's free-text question.
    pub question: String,

    /// Answer language. Defaults to Dutch, matching the widget's market.
    #[serde(default)]
    pub language: Language,

    /// URL of the page the widget is embedded on, used for the on-demand
    /// scrape fallback.
    #[serde(default)]
    pub source_url: Option<String>,
}

impl QARequest {
    /// Boundary validation: non-empty question within the length limit.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.tenant_id.trim().is_empty() {
            return Err(RequestError::MissingTenant);
        }

        let question = self.question.trim();
        if question.is_empty() {
            return Err(RequestError::EmptyQuestion);
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(RequestError::QuestionTooLong {
                max: MAX_QUESTION_CHARS,
            });
        }

        Ok(())
    }
}

/// Request validation errors (surfaced as 400s by the gateway).
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("tenantId is required")]
    MissingTenant,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("question exceeds {max} characters")]
    QuestionTooLong { max: usize },
}

/// The `productCode` field as it arrives on the wire.
///
/// Older widget builds sometimes serialize the whole detection result object
/// into this field instead of the code string (client defect). Both shapes
/// are accepted; anything else fails deserialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawProductRef {
    /// The intended shape: a plain code string.
    Code(String),

    /// Malformed object; a usable code may hide in a sub-field.
    Object(serde_json::Map<String, serde_json::Value>),
}

/// A typed identifier detected on the product page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypedIdentifier {
    #[serde(rename = "type")]
    pub kind: IdentifierKind,
    pub value: String,
}

/// Identifier kinds produced by page-side detection, in rough order of
/// reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Gtin,
    Sku,
    Id,
    Name,
}

/// Product attributes scraped from the page, either client-side or by the
/// on-demand backend scrape. Request-scoped; never persisted.
///
/// Maps are `BTreeMap` so prompt rendering iterates them in a stable order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedContext {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub gtin: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ScrapedContext {
    /// Whether the context carries any code-like identifier.
    pub fn has_identifier(&self) -> bool {
        has_text(&self.product_id) || has_text(&self.gtin) || has_text(&self.sku)
    }

    /// Whether the context is worth showing to the generation model at all.
    pub fn is_usable(&self) -> bool {
        has_text(&self.name) || has_text(&self.description)
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Answer language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Nl,
    En,
}

impl Language {
    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Nl => "nl",
            Language::En => "en",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_request_json() -> serde_json::Value {
        serde_json::json!({
            "tenantId": "1080586",
            "question": "Is it waterproof?"
        })
    }

    #[test]
    fn test_minimal_request_deserializes() {
        let req: QARequest = serde_json::from_value(minimal_request_json()).unwrap();
        assert_eq!(req.tenant_id, "1080586");
        assert!(req.product_code.is_none());
        assert!(req.identifier.is_none());
        assert_eq!(req.language, Language::Nl);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_product_code_string_shape() {
        let req: QARequest = serde_json::from_value(serde_json::json!({
            "tenantId": "t",
            "question": "q?",
            "productCode": "123"
        }))
        .unwrap();

        match req.product_code {
            Some(RawProductRef::Code(code)) => assert_eq!(code, "123"),
            other => panic!("expected string code, got {:?}", other),
        }
    }

    #[test]
    fn test_product_code_object_shape() {
        let req: QARequest = serde_json::from_value(serde_json::json!({
            "tenantId": "t",
            "question": "q?",
            "productCode": {"type": "gtin", "value": "8712345678906"}
        }))
        .unwrap();

        match req.product_code {
            Some(RawProductRef::Object(map)) => {
                assert_eq!(map.get("value").and_then(|v| v.as_str()), Some("8712345678906"));
            }
            other => panic!("expected object code, got {:?}", other),
        }
    }

    #[test]
    fn test_product_code_number_is_rejected() {
        let result: Result<QARequest, _> = serde_json::from_value(serde_json::json!({
            "tenantId": "t",
            "question": "q?",
            "productCode": 123
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_typed_identifier_kinds() {
        let req: QARequest = serde_json::from_value(serde_json::json!({
            "tenantId": "t",
            "question": "q?",
            "identifier": {"type": "name", "value": "Wireless Mouse Pro"}
        }))
        .unwrap();

        let ident = req.identifier.unwrap();
        assert_eq!(ident.kind, IdentifierKind::Name);
        assert_eq!(ident.value, "Wireless Mouse Pro");
    }

    #[test]
    fn test_validate_rejects_empty_question() {
        let req: QARequest = serde_json::from_value(serde_json::json!({
            "tenantId": "t",
            "question": "   "
        }))
        .unwrap();
        assert!(matches!(req.validate(), Err(RequestError::EmptyQuestion)));
    }

    #[test]
    fn test_validate_rejects_overlong_question() {
        let req: QARequest = serde_json::from_value(serde_json::json!({
            "tenantId": "t",
            "question": "x".repeat(MAX_QUESTION_CHARS + 1)
        }))
        .unwrap();
        assert!(matches!(
            req.validate(),
            Err(RequestError::QuestionTooLong { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_question_at_limit() {
        let req: QARequest = serde_json::from_value(serde_json::json!({
            "tenantId": "t",
            "question": "x".repeat(MAX_QUESTION_CHARS)
        }))
        .unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_scraped_context_identifier_and_usability() {
        let empty = ScrapedContext::default();
        assert!(!empty.has_identifier());
        assert!(!empty.is_usable());

        let with_sku = ScrapedContext {
            sku: Some("AB1".to_string()),
            ..Default::default()
        };
        assert!(with_sku.has_identifier());
        assert!(!with_sku.is_usable());

        let with_description = ScrapedContext {
            description: Some("A fine mouse".to_string()),
            ..Default::default()
        };
        assert!(!with_description.has_identifier());
        assert!(with_description.is_usable());
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::Nl.code(), "nl");
        assert_eq!(Language::En.code(), "en");
        assert_eq!(Language::default(), Language::Nl);
    }
}
