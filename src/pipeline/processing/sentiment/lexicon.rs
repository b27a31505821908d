use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{bounded, SentimentScorer, SentimentStrategy};

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

pub const DEFAULT_POSITIVE: &[&str] = &[
    "good", "great", "excellent", "amazing", "awesome", "delicious", "tasty", "love", "loved",
    "lovely", "nice", "best", "fantastic", "wonderful", "perfect", "friendly", "fresh",
    "recommend", "recommended", "enjoy", "enjoyed", "yummy", "superb", "outstanding", "pleasant",
    "happy", "favourite", "favorite", "polite", "clean", "quick", "flavorful", "generous",
];

pub const DEFAULT_NEGATIVE: &[&str] = &[
    "bad", "poor", "terrible", "awful", "horrible", "worst", "bland", "cold", "stale", "rude",
    "slow", "dirty", "disappointing", "disappointed", "disgusting", "overpriced", "hate",
    "hated", "mediocre", "soggy", "greasy", "tasteless", "unhygienic", "raw", "burnt",
    "undercooked", "inedible", "unfriendly",
];

/// Word-count polarity: `(positive hits - negative hits) / token count`.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    positive: HashSet<String>,
    negative: HashSet<String>,
}

impl LexiconScorer {
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let fold = |w: &str| w.trim().to_lowercase();
        Self {
            positive: positive.into_iter().map(|w| fold(w.as_ref())).collect(),
            negative: negative.into_iter().map(|w| fold(w.as_ref())).collect(),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        PUNCTUATION
            .replace_all(&lowered, "")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new(DEFAULT_POSITIVE.iter().copied(), DEFAULT_NEGATIVE.iter().copied())
    }
}

impl SentimentScorer for LexiconScorer {
    fn strategy(&self) -> SentimentStrategy {
        SentimentStrategy::Lexicon
    }

    fn score(&self, text: &str) -> f64 {
        let tokens = Self::tokens(text);
        if tokens.is_empty() {
            return 0.0;
        }
        // a word in both sets counts toward both sums and nets out
        let positive = tokens.iter().filter(|t| self.positive.contains(*t)).count() as f64;
        let negative = tokens.iter().filter(|t| self.negative.contains(*t)).count() as f64;
        bounded((positive - negative) / tokens.len() as f64)
    }
}
