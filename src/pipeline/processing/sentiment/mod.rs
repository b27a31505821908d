//! Polarity scoring of normalized review text.
//!
//! Two strategies share one interface. The strategy is fixed per deployment so a
//! table never mixes scores from both.

pub mod lexicon;
pub mod model;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IngestError;

pub use lexicon::LexiconScorer;
pub use model::ModelScorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentStrategy {
    #[default]
    Lexicon,
    Model,
}

impl fmt::Display for SentimentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentStrategy::Lexicon => f.write_str("lexicon"),
            SentimentStrategy::Model => f.write_str("model"),
        }
    }
}

impl FromStr for SentimentStrategy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexicon" => Ok(SentimentStrategy::Lexicon),
            "model" => Ok(SentimentStrategy::Model),
            other => Err(IngestError::Config(format!(
                "unknown sentiment strategy '{}' (expected 'lexicon' or 'model')",
                other
            ))),
        }
    }
}

/// Maps text to a polarity in `[-1.0, 1.0]`.
///
/// Implementations are pure with respect to the input and never fail: anything
/// unscorable is `0.0`.
pub trait SentimentScorer: Send + Sync {
    fn strategy(&self) -> SentimentStrategy;

    fn score(&self, text: &str) -> f64;
}

/// Clamp into the polarity range; non-finite values are unscorable.
pub(crate) fn bounded(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Model".parse::<SentimentStrategy>().unwrap(), SentimentStrategy::Model);
        assert_eq!(" lexicon ".parse::<SentimentStrategy>().unwrap(), SentimentStrategy::Lexicon);
        assert!("vader".parse::<SentimentStrategy>().is_err());
    }

    #[test]
    fn bounded_handles_out_of_range_and_nan() {
        assert_eq!(bounded(1.7), 1.0);
        assert_eq!(bounded(-3.0), -1.0);
        assert_eq!(bounded(f64::NAN), 0.0);
        assert_eq!(bounded(0.25), 0.25);
    }
}
