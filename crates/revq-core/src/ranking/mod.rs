//! Review relevance ranking.
//!
//! Pure scoring over the fetched reviews: keyword overlap with the question,
//! a richness boost for substantial bodies, and a recency boost. The ranker
//! takes `now` as an argument so scoring is reproducible.

use chrono::{DateTime, Duration, Utc};

use crate::reviews::Review;

/// How many ranked excerpts the final response shows.
pub const EXCERPT_LIMIT: usize = 3;

/// How many ranked reviews feed the prompt's evidence pool.
pub const EVIDENCE_LIMIT: usize = 15;

/// Scoring weights and thresholds.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Question tokens must be strictly longer than this to count.
    pub min_token_len: usize,
    /// Score added per matching question token.
    pub keyword_weight: i32,
    /// Bodies longer than this earn the richness boost.
    pub rich_body_chars: usize,
    pub rich_body_weight: i32,
    /// Reviews younger than this earn the recency boost.
    pub recency_days: i64,
    pub recency_weight: i32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            keyword_weight: 2,
            rich_body_chars: 50,
            rich_body_weight: 1,
            recency_days: 30,
            recency_weight: 1,
        }
    }
}

/// Why a review scored what it did. Only used for ordering and debugging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchReasons {
    pub keyword_hits: usize,
    pub rich_body: bool,
    pub recent: bool,
}

/// A review plus its computed relevance.
#[derive(Debug, Clone)]
pub struct RankedReview {
    pub review: Review,
    pub score: i32,
    pub reasons: MatchReasons,
}

/// Scores and orders reviews by relevance to `question`.
///
/// Deterministic: sorted by score descending, ties by date descending, and
/// the sort is stable beyond that.
pub fn rank(
    reviews: &[Review],
    question: &str,
    now: DateTime<Utc>,
    config: &RankingConfig,
) -> Vec<RankedReview> {
    // Punctuation is trimmed so "waterproof?" still matches review text.
    let question_tokens: Vec<String> = question
        .to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| t.len() > config.min_token_len)
        .collect();

    let recency_cutoff = now - Duration::days(config.recency_days);

    let mut ranked: Vec<RankedReview> = reviews
        .iter()
        .map(|review| {
            let text = review.combined_text().to_lowercase();

            let keyword_hits = question_tokens
                .iter()
                .filter(|token| text.contains(token.as_str()))
                .count();

            let rich_body = review
                .text
                .as_deref()
                .is_some_and(|t| t.len() > config.rich_body_chars);

            let recent = review.date > recency_cutoff;

            let mut score = keyword_hits as i32 * config.keyword_weight;
            if rich_body {
                score += config.rich_body_weight;
            }
            if recent {
                score += config.recency_weight;
            }

            RankedReview {
                review: review.clone(),
                score,
                reasons: MatchReasons {
                    keyword_hits,
                    rich_body,
                    recent,
                },
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.review.date.cmp(&a.review.date))
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap()
    }

    fn review_at(text: &str, days_ago: i64) -> Review {
        Review {
            rating: 8.0,
            title: None,
            text: Some(text.to_string()),
            author: None,
            date: now() - Duration::days(days_ago),
            city: None,
            language: None,
            product_name: None,
        }
    }

    #[test]
    fn test_keyword_hits_score_two_each() {
        let reviews = vec![review_at("totally waterproof jacket", 100)];
        let ranked = rank(&reviews, "Is it waterproof?", now(), &RankingConfig::default());

        // "waterproof" hits (+2); body is short and old, no boosts.
        assert_eq!(ranked[0].score, 2);
        assert_eq!(ranked[0].reasons.keyword_hits, 1);
        assert!(!ranked[0].reasons.rich_body);
        assert!(!ranked[0].reasons.recent);
    }

    #[test]
    fn test_short_tokens_are_ignored() {
        // Every question token is <= 3 chars, so no keyword score at all.
        let reviews = vec![review_at("it is big and red", 100)];
        let ranked = rank(&reviews, "is it big", now(), &RankingConfig::default());
        assert_eq!(ranked[0].reasons.keyword_hits, 0);
    }

    #[test]
    fn test_rich_body_boost() {
        let long_text = "x".repeat(60);
        let reviews = vec![review_at(&long_text, 100), review_at("short", 100)];
        let ranked = rank(&reviews, "anything", now(), &RankingConfig::default());

        assert!(ranked[0].reasons.rich_body);
        assert_eq!(ranked[0].score, 1);
        assert_eq!(ranked[1].score, 0);
    }

    #[test]
    fn test_recency_boost() {
        let reviews = vec![review_at("old", 45), review_at("new", 5)];
        let ranked = rank(&reviews, "anything", now(), &RankingConfig::default());

        assert!(ranked[0].reasons.recent);
        assert_eq!(ranked[0].review.text.as_deref(), Some("new"));
        assert_eq!(ranked[0].score, 1);
    }

    #[test]
    fn test_ties_break_by_most_recent_date() {
        let reviews = vec![review_at("same score", 200), review_at("same score", 150)];
        let ranked = rank(&reviews, "unrelated", now(), &RankingConfig::default());

        assert_eq!(ranked[0].score, ranked[1].score);
        assert!(ranked[0].review.date > ranked[1].review.date);
    }

    #[test]
    fn test_matching_is_case_insensitive_and_counts_title() {
        let review = Review {
            title: Some("WATERPROOF and windproof".to_string()),
            text: None,
            ..review_at("", 100)
        };
        let ranked = rank(
            &[review],
            "waterproof windproof?",
            now(),
            &RankingConfig::default(),
        );

        assert_eq!(ranked[0].reasons.keyword_hits, 2);
        assert_eq!(ranked[0].score, 4);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let reviews = vec![
            review_at("waterproof and well made, kept me dry on a long wet hike", 10),
            review_at("fine", 400),
            review_at("waterproof", 2),
        ];

        let first = rank(&reviews, "Is it waterproof?", now(), &RankingConfig::default());
        let second = rank(&reviews, "Is it waterproof?", now(), &RankingConfig::default());

        let scores: Vec<i32> = first.iter().map(|r| r.score).collect();
        let scores_again: Vec<i32> = second.iter().map(|r| r.score).collect();
        assert_eq!(scores, scores_again);
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}
