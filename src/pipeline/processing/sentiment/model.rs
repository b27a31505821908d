use tracing::warn;

use super::{bounded, SentimentScorer, SentimentStrategy};
use crate::app::ports::PolarityModel;

/// Delegates to an external polarity model and passes its value through.
pub struct ModelScorer {
    model: Box<dyn PolarityModel>,
}

impl ModelScorer {
    pub fn new(model: Box<dyn PolarityModel>) -> Self {
        Self { model }
    }
}

impl SentimentScorer for ModelScorer {
    fn strategy(&self) -> SentimentStrategy {
        SentimentStrategy::Model
    }

    fn score(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        match self.model.polarity(text) {
            Ok(p) => bounded(p),
            Err(e) => {
                warn!(model = self.model.name(), "polarity model unavailable, scoring 0.0: {:#}", e);
                crate::observability::metrics::score::model_unavailable();
                0.0
            }
        }
    }
}
