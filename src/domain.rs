use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fields of the canonical review shape, independent of upstream column naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Title,
    ReviewCount,
    Category,
    ReviewText,
    Sentiment,
    PopularFood,
    OnlineOrder,
}

impl CanonicalField {
    /// Fields that are read from the input buffer. Sentiment is derived, never sourced.
    pub const SOURCED: [CanonicalField; 6] = [
        CanonicalField::Title,
        CanonicalField::ReviewCount,
        CanonicalField::Category,
        CanonicalField::ReviewText,
        CanonicalField::PopularFood,
        CanonicalField::OnlineOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Title => "title",
            CanonicalField::ReviewCount => "review_count",
            CanonicalField::Category => "category",
            CanonicalField::ReviewText => "review_text",
            CanonicalField::Sentiment => "sentiment",
            CanonicalField::PopularFood => "popular_food",
            CanonicalField::OnlineOrder => "online_order",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Online ordering is a yes/no flag for most producers, free text for a few.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OnlineOrder {
    Flag(bool),
    Text(String),
}

impl Default for OnlineOrder {
    fn default() -> Self {
        OnlineOrder::Text(String::new())
    }
}

impl OnlineOrder {
    /// Store representation. Flags are written the way upstream files spell them.
    pub fn to_store_text(&self) -> String {
        match self {
            OnlineOrder::Flag(true) => "Yes".to_string(),
            OnlineOrder::Flag(false) => "No".to_string(),
            OnlineOrder::Text(s) => s.clone(),
        }
    }
}

/// The normalized unit of persistence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    pub review_count: i64,
    pub category: String,
    pub review_text: String,
    pub sentiment: f64,
    pub popular_food: String,
    pub online_order: OnlineOrder,
}

/// Pipeline stage that can abort a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Reconcile,
    Score,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Reconcile => "reconcile",
            Stage::Score => "score",
            Stage::Persist => "persist",
        };
        f.write_str(s)
    }
}

/// Lifecycle of one batch through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Reconciled,
    Scored,
    Persisted,
    Reported,
    Failed(Stage),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Reported | PipelineState::Failed(_))
    }
}

/// An error or warning attached to a row. `row_index` is `None` for batch-level entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row_index: Option<usize>,
    pub message: String,
}

impl RowError {
    pub fn row(row_index: usize, message: impl Into<String>) -> Self {
        Self {
            row_index: Some(row_index),
            message: message.into(),
        }
    }

    pub fn batch(message: impl Into<String>) -> Self {
        Self {
            row_index: None,
            message: message.into(),
        }
    }
}

/// Summary of one ingested batch, returned to the trigger and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub batch_id: Uuid,
    pub source: String,
    pub rows_total: usize,
    pub rows_written: usize,
    pub rows_failed: usize,
    pub errors: Vec<RowError>,
    pub warnings: Vec<RowError>,
    pub state: PipelineState,
    pub retryable: bool,
    pub duplicate: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestOutcome {
    pub fn new(source: impl Into<String>, rows_total: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            source: source.into(),
            rows_total,
            rows_written: 0,
            rows_failed: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            state: PipelineState::Received,
            retryable: false,
            duplicate: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark every row failed with a single batch-level entry. Nothing is committed.
    pub fn fail_batch(&mut self, stage: Stage, error: RowError, retryable: bool) {
        self.rows_written = 0;
        self.rows_failed = self.rows_total;
        self.errors.push(error);
        self.retryable = retryable;
        self.state = PipelineState::Failed(stage);
    }

    pub fn finish(&mut self) {
        if !self.state.is_terminal() {
            self.state = PipelineState::Reported;
        }
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state, PipelineState::Reported)
    }

    /// Stage that failed the batch, if any.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self.state {
            PipelineState::Failed(stage) => Some(stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_batch_marks_every_row_failed() {
        let mut outcome = IngestOutcome::new("upload.csv", 4);
        outcome.rows_written = 2;
        outcome.fail_batch(Stage::Persist, RowError::batch("connection reset"), true);
        outcome.finish();

        assert_eq!(outcome.rows_failed, 4);
        assert_eq!(outcome.rows_written, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.failed_stage(), Some(Stage::Persist));
        assert!(outcome.retryable);
        assert!(!outcome.is_success());
    }

    #[test]
    fn online_order_flags_use_upstream_spelling() {
        assert_eq!(OnlineOrder::Flag(true).to_store_text(), "Yes");
        assert_eq!(OnlineOrder::Flag(false).to_store_text(), "No");
        assert_eq!(OnlineOrder::Text("Swiggy".into()).to_store_text(), "Swiggy");
    }
}
