//! Prompt assembly.
//!
//! Builds the localized system instruction and the structured context prompt
//! from product facts, ranked review evidence, and optional scraped specs.
//! Assembly is deterministic: identical inputs produce a byte-identical
//! prompt, so cache keys and regression tests can rely on the output.

use crate::ranking::RankedReview;
use crate::resolver::nonempty;
use crate::request::{Language, ScrapedContext};
use crate::reviews::ShopReviews;

/// Reviews at or above this rating count as positive in the pros/cons
/// summary (10-point scale).
const POSITIVE_RATING_THRESHOLD: f32 = 7.0;

/// At most this many review excerpts are rendered into the prompt.
const PROMPT_REVIEW_LIMIT: usize = 10;

/// Scraped descriptions are clipped to this length.
const DESCRIPTION_LIMIT: usize = 300;

/// Descriptions at or below this length are treated as absent.
const DESCRIPTION_MIN_CHARS: usize = 10;

/// Everything the assembler needs to build one prompt.
pub struct PromptInputs<'a> {
    pub product_code: Option<&'a str>,
    pub product_name: Option<&'a str>,
    /// Product average on the provider's 10-point scale.
    pub average_rating: Option<f32>,
    pub review_count: usize,
    pub shop: Option<&'a ShopReviews>,
    /// Ranked evidence pool, best first.
    pub reviews: &'a [RankedReview],
    pub question: &'a str,
    pub language: Language,
    pub context: Option<&'a ScrapedContext>,
}

/// The system instruction and user prompt handed to the generation client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub system_instruction: String,
    pub prompt: String,
}

/// Assembles the prompt. Pure; no allocation outside the output strings.
pub fn build_prompt(inputs: &PromptInputs) -> AssembledPrompt {
    let system_instruction = system_instruction(inputs);

    let sections = [
        specs_section(inputs),
        product_section(inputs),
        reviews_section(inputs),
        Some(question_section(inputs)),
    ];

    let prompt = sections
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n\n");

    AssembledPrompt {
        system_instruction,
        prompt,
    }
}

fn system_instruction(inputs: &PromptInputs) -> String {
    let product = inputs.product_name.unwrap_or(match inputs.language {
        Language::Nl => "dit product",
        Language::En => "this product",
    });
    let has_specs = inputs.context.is_some_and(|c| c.is_usable());

    match inputs.language {
        Language::Nl => {
            let sources = if has_specs {
                "de officiële productspecificaties en de echte klantbeoordelingen die je hebt ontvangen"
            } else {
                "ALLEEN de echte klantbeoordelingen die je hebt ontvangen"
            };

            format!(
                "Je bent een objectieve productexpert assistent voor {product}.\n\
                 \n\
                 Je taak is om vragen te beantwoorden op basis van {sources}. \
                 Je verzint geen informatie en bent eerlijk over wat je wel en niet weet.\n\
                 \n\
                 ANTWOORD RICHTLIJNEN:\n\
                 1. Baseer antwoorden UITSLUITEND op de gegeven data\n\
                 2. Verwijs naar echte klanten: 'Uit reviews blijkt...', 'Klanten melden...'\n\
                 3. Quote specifieke reviews wanneer relevant (gebruik aanhalingstekens)\n\
                 4. Geef een gebalanceerd beeld (positief EN negatief als beide in reviews staan)\n\
                 5. Als informatie ontbreekt: 'In de reviews wordt dit niet specifiek genoemd'\n\
                 6. Houd antwoorden kort: maximaal 3-4 zinnen\n\
                 7. Gebruik vriendelijke, behulpzame toon\n\
                 8. Antwoord in het Nederlands\n\
                 9. Noem NOOIT concurrenten of alternatieve producten\n\
                 10. Voor technische vragen: gebruik exacte specs als beschikbaar\n\
                 11. Voor ervaringsvragen: verwijs naar ratings en review content"
            )
        }
        Language::En => {
            let sources = if has_specs {
                "the official product specifications and the real customer reviews provided"
            } else {
                "ONLY the real customer reviews provided"
            };

            format!(
                "You are an objective product expert assistant for {product}.\n\
                 \n\
                 Your task is to answer questions based on {sources}. \
                 You don't make up information and are honest about what you know and don't know.\n\
                 \n\
                 ANSWER GUIDELINES:\n\
                 1. Base answers EXCLUSIVELY on the given data\n\
                 2. Reference real customers: 'Reviews show...', 'Customers report...'\n\
                 3. Quote specific reviews when relevant (use quotation marks)\n\
                 4. Provide a balanced view (positive AND negative if both in reviews)\n\
                 5. If information is missing: 'This is not specifically mentioned in the reviews'\n\
                 6. Keep answers concise: maximum 3-4 sentences\n\
                 7. Use friendly, helpful tone\n\
                 8. Answer in English\n\
                 9. NEVER mention competitors or alternative products\n\
                 10. For technical questions: use exact specs if available\n\
                 11. For experience questions: reference ratings and review content"
            )
        }
    }
}

fn specs_section(inputs: &PromptInputs) -> Option<String> {
    let context = inputs.context?;

    let mut lines: Vec<String> = Vec::new();

    if let Some(name) = nonempty(context.name.as_deref()) {
        lines.push(format!("Product: {name}"));
    }

    if let Some(description) = nonempty(context.description.as_deref()) {
        if description.chars().count() > DESCRIPTION_MIN_CHARS {
            let clipped: String = description.chars().take(DESCRIPTION_LIMIT).collect();
            let label = match inputs.language {
                Language::Nl => "Beschrijving",
                Language::En => "Description",
            };
            lines.push(format!("{label}: {clipped}"));
        }
    }

    if !context.specs.is_empty() {
        let label = match inputs.language {
            Language::Nl => "Technische specificaties",
            Language::En => "Technical specifications",
        };
        lines.push(format!("{label}:"));
        for (key, value) in &context.specs {
            lines.push(format!("- {}: {value}", humanize_key(key)));
        }
    }

    if !context.attributes.is_empty() {
        let label = match inputs.language {
            Language::Nl => "Kenmerken",
            Language::En => "Attributes",
        };
        lines.push(format!("{label}:"));
        for (key, value) in &context.attributes {
            lines.push(format!("- {}: {value}", humanize_key(key)));
        }
    }

    if lines.is_empty() {
        return None;
    }

    let title = match inputs.language {
        Language::Nl => "PRODUCTSPECIFICATIES",
        Language::En => "PRODUCT SPECIFICATIONS",
    };
    Some(format!("{title}:\n{}", lines.join("\n")))
}

fn product_section(inputs: &PromptInputs) -> Option<String> {
    let nl = inputs.language == Language::Nl;

    let mut lines: Vec<String> = Vec::new();
    lines.push(
        if nl {
            "PRODUCTINFORMATIE:"
        } else {
            "PRODUCT INFORMATION:"
        }
        .to_string(),
    );

    if let Some(code) = inputs.product_code {
        lines.push(format!("- GTIN/EAN: {code}"));
    }
    if let Some(name) = inputs.product_name {
        lines.push(format!(
            "- {}: {name}",
            if nl { "Productnaam" } else { "Product name" }
        ));
    }
    if let Some(rating) = inputs.average_rating {
        lines.push(format!(
            "- {}: {}/10 {}",
            if nl {
                "Gemiddelde beoordeling"
            } else {
                "Average rating"
            },
            format_rating(rating),
            if nl { "sterren" } else { "stars" }
        ));
    }
    lines.push(format!(
        "- {}: {}",
        if nl {
            "Aantal beoordelingen"
        } else {
            "Number of reviews"
        },
        inputs.review_count
    ));

    if let Some(shop) = inputs.shop {
        if let Some(rating) = shop.average_rating {
            lines.push(format!(
                "- {}: {}/10",
                if nl { "Winkelbeoordeling" } else { "Shop rating" },
                format_rating(rating)
            ));
        }
        if let Some(recommendation) = shop.recommendation_percentage {
            lines.push(format!(
                "- {}: {}%",
                if nl {
                    "Aanbevelingspercentage"
                } else {
                    "Recommendation percentage"
                },
                format_rating(recommendation)
            ));
        }
    }

    let (positive, negative) = count_sentiment(inputs.reviews);
    let total = inputs.reviews.len();

    lines.push(String::new());
    lines.push(
        if nl {
            "REVIEW ANALYSE:"
        } else {
            "REVIEW ANALYSIS:"
        }
        .to_string(),
    );

    if positive > 0 {
        lines.push(if nl {
            format!(
                "Positieve aspecten (vaak genoemd):\n- Hoge klanttevredenheid ({positive} van {total} reviews met 7+ sterren)"
            )
        } else {
            format!(
                "Positive aspects (often mentioned):\n- High customer satisfaction ({positive} of {total} reviews with 7+ stars)"
            )
        });
    }
    if negative > 0 {
        lines.push(if nl {
            format!(
                "Aandachtspunten (soms genoemd):\n- Enkele kritische punten ({negative} reviews onder 7 sterren)"
            )
        } else {
            format!(
                "Points of attention (sometimes mentioned):\n- Some critical notes ({negative} reviews under 7 stars)"
            )
        });
    }

    Some(lines.join("\n"))
}

fn reviews_section(inputs: &PromptInputs) -> Option<String> {
    let nl = inputs.language == Language::Nl;

    if inputs.reviews.is_empty() {
        return Some(
            if nl {
                "RECENTE KLANTREVIEWS:\n(Geen reviews beschikbaar)"
            } else {
                "RECENT CUSTOMER REVIEWS:\n(No reviews available)"
            }
            .to_string(),
        );
    }

    let entries: Vec<String> = inputs
        .reviews
        .iter()
        .take(PROMPT_REVIEW_LIMIT)
        .map(|ranked| {
            let review = &ranked.review;
            let author = review.author.as_deref().unwrap_or(if nl {
                "Anoniem"
            } else {
                "Anonymous"
            });

            let attribution = match review.city.as_deref().filter(|c| !c.trim().is_empty()) {
                Some(city) if nl => format!("- {author} uit {city}"),
                Some(city) => format!("- {author} from {city}"),
                None => format!("- {author}"),
            };

            format!(
                "{}/10 - {}\n'{}'\n{}",
                format_rating(review.rating),
                review.date.format("%Y-%m-%d"),
                review.excerpt_text(),
                attribution
            )
        })
        .collect();

    let title = if nl {
        "RECENTE KLANTREVIEWS (meest relevant voor deze vraag):"
    } else {
        "RECENT CUSTOMER REVIEWS (most relevant to this question):"
    };

    Some(format!("{title}\n{}", entries.join("\n\n")))
}

fn question_section(inputs: &PromptInputs) -> String {
    match inputs.language {
        Language::Nl => format!("Vraag van klant: {}", inputs.question),
        Language::En => format!("Customer question: {}", inputs.question),
    }
}

fn count_sentiment(reviews: &[RankedReview]) -> (usize, usize) {
    let positive = reviews
        .iter()
        .filter(|r| r.review.rating >= POSITIVE_RATING_THRESHOLD)
        .count();
    (positive, reviews.len() - positive)
}

/// `8.0` renders as `8`, `8.4` stays `8.4`.
fn format_rating(value: f32) -> String {
    if (value - value.round()).abs() < f32::EPSILON {
        format!("{}", value.round() as i64)
    } else {
        format!("{value}")
    }
}

/// `delivery_time` becomes `Delivery Time`.
fn humanize_key(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
