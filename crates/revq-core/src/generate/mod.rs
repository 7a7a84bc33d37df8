//! Answer generation and post-processing.
//!
//! Wraps the chat provider behind [`AnswerGenerator`], then derives a
//! confidence tier and a token estimate from the generated text. The
//! confidence heuristic is deliberately shallow: it looks for signals that
//! the model actually used the supplied evidence (review references, numbers,
//! quotes) and for hedging phrases that suggest it did not.

use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::prompt::AssembledPrompt;
use crate::request::Language;

/// Generation sampling parameters, fixed across providers.
const TEMPERATURE: f64 = 0.7;
const TOP_P: f64 = 0.9;
const MAX_OUTPUT_TOKENS: u32 = 500;

/// Answers shorter than this lose a confidence point.
const SHORT_ANSWER_CHARS: usize = 50;

/// Heuristic confidence tier for a generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// A generated answer plus derived metadata.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub confidence: Confidence,
    pub approx_tokens: usize,
}

/// Generation failures, classified for the error taxonomy.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Missing or rejected provider credential.
    #[error("generation provider rejected credentials: {message}")]
    Auth { message: String },

    /// Provider quota exhausted; expected to be transient.
    #[error("generation provider quota exhausted: {message}")]
    Quota { message: String },

    /// Anything else.
    #[error("generation failed: {message}")]
    Provider { message: String },
}

/// Text completion seam. Implementations return the raw answer text.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn complete(&self, prompt: &AssembledPrompt) -> Result<String, GenerateError>;
}

/// genai-backed generator.
pub struct GenAiGenerator {
    client: genai::Client,
    model: String,
    options: ChatOptions,
}

impl GenAiGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: genai::Client::default(),
            model: model.into(),
            options: ChatOptions::default()
                .with_temperature(TEMPERATURE)
                .with_top_p(TOP_P)
                .with_max_tokens(MAX_OUTPUT_TOKENS),
        }
    }
}

#[async_trait]
impl AnswerGenerator for GenAiGenerator {
    async fn complete(&self, prompt: &AssembledPrompt) -> Result<String, GenerateError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(&prompt.system_instruction),
            ChatMessage::user(&prompt.prompt),
        ]);

        let response = self
            .client
            .exec_chat(&self.model, request, Some(&self.options))
            .await
            .map_err(|e| classify_provider_error(&e.to_string()))?;

        Ok(response.first_text().unwrap_or_default().to_string())
    }
}

/// Maps a provider error message onto the taxonomy.
fn classify_provider_error(message: &str) -> GenerateError {
    let lowered = message.to_lowercase();
    if lowered.contains("api key") {
        GenerateError::Auth {
            message: message.to_string(),
        }
    } else if lowered.contains("quota") {
        GenerateError::Quota {
            message: message.to_string(),
        }
    } else {
        GenerateError::Provider {
            message: message.to_string(),
        }
    }
}

/// Canned generator used when no provider credentials are configured
/// (development and demo mode).
#[derive(Debug, Clone, Default)]
pub struct StubGenerator;

#[async_trait]
impl AnswerGenerator for StubGenerator {
    async fn complete(&self, prompt: &AssembledPrompt) -> Result<String, GenerateError> {
        // Localize on the question label the assembler used.
        let answer = if prompt.prompt.contains("Customer question:") {
            "Reviews show customers are generally satisfied with this product."
        } else {
            "Uit reviews blijkt dat klanten over het algemeen tevreden zijn met dit product."
        };
        Ok(answer.to_string())
    }
}

/// Generator with scripted behavior for tests.
#[cfg(any(test, feature = "mock"))]
pub struct MockGenerator {
    result: std::sync::Arc<
        parking_lot::Mutex<Box<dyn Fn() -> Result<String, GenerateError> + Send + Sync>>,
    >,
    calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(any(test, feature = "mock"))]
impl MockGenerator {
    pub fn returning(answer: &str) -> Self {
        let answer = answer.to_string();
        Self {
            result: std::sync::Arc::new(parking_lot::Mutex::new(Box::new(move || {
                Ok(answer.clone())
            }))),
            calls: Default::default(),
        }
    }

    pub fn failing(make_error: impl Fn() -> GenerateError + Send + Sync + 'static) -> Self {
        Self {
            result: std::sync::Arc::new(parking_lot::Mutex::new(Box::new(move || {
                Err(make_error())
            }))),
            calls: Default::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl AnswerGenerator for MockGenerator {
    async fn complete(&self, _prompt: &AssembledPrompt) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        (self.result.lock())()
    }
}

/// Keyword lists feeding the confidence heuristic.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Words suggesting the answer references the review evidence.
    pub reference_keywords: Vec<String>,
    /// Hedging phrases suggesting the evidence did not cover the question.
    pub uncertainty_phrases: Vec<String>,
}

impl ScoringConfig {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Nl => Self {
                reference_keywords: vec![
                    "review".to_string(),
                    "klanten".to_string(),
                    "beoordelingen".to_string(),
                ],
                uncertainty_phrases: vec![
                    "niet vermeld".to_string(),
                    "onbekend".to_string(),
                    "geen informatie".to_string(),
                ],
            },
            Language::En => Self {
                reference_keywords: vec![
                    "review".to_string(),
                    "customer".to_string(),
                ],
                uncertainty_phrases: vec![
                    "not mentioned".to_string(),
                    "unknown".to_string(),
                    "no information".to_string(),
                ],
            },
        }
    }
}

/// Scores an answer into a confidence tier.
///
/// Accumulator starts at 0: +2 for a review-reference keyword, +2 for a
/// digit, +1 for a quotation mark, -2 for an uncertainty phrase, -1 when
/// shorter than 50 characters. Score >= 3 is high, >= 1 medium, else low.
pub fn score_confidence(answer: &str, config: &ScoringConfig) -> Confidence {
    let lowered = answer.to_lowercase();
    let mut score: i32 = 0;

    if config
        .reference_keywords
        .iter()
        .any(|k| lowered.contains(k.as_str()))
    {
        score += 2;
    }

    if answer.chars().any(|c| c.is_ascii_digit()) {
        score += 2;
    }

    if answer.contains('"') || answer.contains('\'') {
        score += 1;
    }

    if config
        .uncertainty_phrases
        .iter()
        .any(|p| lowered.contains(p.as_str()))
    {
        score -= 2;
    }

    if answer.chars().count() < SHORT_ANSWER_CHARS {
        score -= 1;
    }

    if score >= 3 {
        Confidence::High
    } else if score >= 1 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Rough token estimate: one token per four characters across the whole
/// generation round trip.
pub fn approx_tokens(prompt: &AssembledPrompt, answer: &str) -> usize {
    let chars = prompt.system_instruction.chars().count()
        + prompt.prompt.chars().count()
        + answer.chars().count();
    chars.div_ceil(4)
}

/// Runs the generator and derives confidence and token metadata.
pub async fn generate_and_score(
    generator: &dyn AnswerGenerator,
    prompt: &AssembledPrompt,
    scoring: &ScoringConfig,
) -> Result<GeneratedAnswer, GenerateError> {
    let raw = generator.complete(prompt).await?;
    let answer = raw.trim().to_string();

    let confidence = score_confidence(&answer, scoring);
    let approx_tokens = approx_tokens(prompt, &answer);

    debug!(?confidence, approx_tokens, "generated answer scored");

    Ok(GeneratedAnswer {
        answer,
        confidence,
        approx_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nl_config() -> ScoringConfig {
        ScoringConfig::for_language(Language::Nl)
    }

    fn prompt() -> AssembledPrompt {
        AssembledPrompt {
            system_instruction: "x".repeat(40),
            prompt: "Vraag van klant: Is it waterproof?".to_string(),
        }
    }

    #[test]
    fn test_score_of_three_is_high() {
        // Keyword (+2) and digit (+2), long enough: score 4.
        let answer =
            "Uit reviews blijkt dat 8 van de 10 klanten de jas volledig waterdicht vinden.";
        assert_eq!(score_confidence(answer, &nl_config()), Confidence::High);
    }

    #[test]
    fn test_score_of_one_or_two_is_medium() {
        // Keyword (+2), short (-1): score 1.
        let answer = "Klanten zijn tevreden.";
        assert_eq!(score_confidence(answer, &nl_config()), Confidence::Medium);
    }

    #[test]
    fn test_zero_or_negative_is_low() {
        // No signals, long enough: score 0.
        let answer = "Het product doet precies wat je ervan mag verwachten vandaag.";
        assert_eq!(score_confidence(answer, &nl_config()), Confidence::Low);

        // Uncertainty (-2) and short (-1): negative.
        let hedged = "Dit is niet vermeld.";
        assert_eq!(score_confidence(hedged, &nl_config()), Confidence::Low);
    }

    #[test]
    fn test_quote_adds_one() {
        // Quote (+1), no other signals, long enough: medium.
        let answer = "Een koper noemde de pasvorm \"uitstekend\" en droeg hem dagelijks buiten.";
        assert_eq!(score_confidence(answer, &nl_config()), Confidence::Medium);
    }

    #[test]
    fn test_uncertainty_cancels_reference_keyword() {
        // Keyword (+2), uncertainty (-2), long enough: 0 -> low.
        let answer =
            "In de reviews wordt dit niet vermeld, dus hierover is niets met zekerheid te zeggen.";
        assert_eq!(score_confidence(answer, &nl_config()), Confidence::Low);
    }

    #[test]
    fn test_english_keyword_list() {
        let config = ScoringConfig::for_language(Language::En);
        let answer = "Customers report the jacket held up well during extended heavy rainfall.";
        assert_eq!(score_confidence(answer, &config), Confidence::Medium);
    }

    #[test]
    fn test_approx_tokens_rounds_up() {
        let prompt = AssembledPrompt {
            system_instruction: "abc".to_string(),
            prompt: "defg".to_string(),
        };
        // 3 + 4 + 2 = 9 chars -> ceil(9/4) = 3.
        assert_eq!(approx_tokens(&prompt, "hi"), 3);
    }

    #[test]
    fn test_classify_provider_error() {
        assert!(matches!(
            classify_provider_error("Invalid API key supplied"),
            GenerateError::Auth { .. }
        ));
        assert!(matches!(
            classify_provider_error("Quota exceeded for model"),
            GenerateError::Quota { .. }
        ));
        assert!(matches!(
            classify_provider_error("connection reset"),
            GenerateError::Provider { .. }
        ));
    }

    #[tokio::test]
    async fn test_generate_and_score_trims_and_scores() {
        let generator =
            MockGenerator::returning("  Uit reviews blijkt dat 9 van 10 klanten tevreden zijn.  ");
        let result = generate_and_score(&generator, &prompt(), &nl_config())
            .await
            .unwrap();

        assert!(!result.answer.starts_with(' '));
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.approx_tokens > 0);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_and_score_propagates_errors() {
        let generator = MockGenerator::failing(|| GenerateError::Quota {
            message: "exhausted".to_string(),
        });
        let result = generate_and_score(&generator, &prompt(), &nl_config()).await;
        assert!(matches!(result, Err(GenerateError::Quota { .. })));
    }

    #[tokio::test]
    async fn test_stub_generator_localizes() {
        let nl = StubGenerator
            .complete(&AssembledPrompt {
                system_instruction: String::new(),
                prompt: "Vraag van klant: test".to_string(),
            })
            .await
            .unwrap();
        assert!(nl.contains("klanten"));

        let en = StubGenerator
            .complete(&AssembledPrompt {
                system_instruction: String::new(),
                prompt: "Customer question: test".to_string(),
            })
            .await
            .unwrap();
        assert!(en.contains("customers"));
    }
}
