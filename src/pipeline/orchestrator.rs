use tracing::{error, info, instrument, warn};

use crate::app::ports::StoreConnector;
use crate::domain::{CanonicalRecord, IngestOutcome, PipelineState, RowError, Stage};
use crate::idempotency::compute_batch_key;
use crate::observability::metrics;
use crate::pipeline::ingestion::TabularBuffer;
use crate::pipeline::processing::normalize::normalize;
use crate::pipeline::processing::reconcile::SchemaReconciler;
use crate::pipeline::processing::sentiment::SentimentScorer;
use crate::pipeline::storage::{BatchPersister, TargetSchema};

/// Runs one batch through reconcile → normalize → score → persist.
///
/// Holds only read-only configuration, so one orchestrator can serve several
/// batches; each batch acquires its own store session.
pub struct PipelineOrchestrator {
    reconciler: SchemaReconciler,
    scorer: Box<dyn SentimentScorer>,
    schema: TargetSchema,
    connector: Box<dyn StoreConnector>,
    dedupe_batches: bool,
}

impl PipelineOrchestrator {
    pub fn new(
        reconciler: SchemaReconciler,
        scorer: Box<dyn SentimentScorer>,
        schema: TargetSchema,
        connector: Box<dyn StoreConnector>,
    ) -> Self {
        Self {
            reconciler,
            scorer,
            schema,
            connector,
            dedupe_batches: false,
        }
    }

    pub fn with_batch_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe_batches = enabled;
        self
    }

    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    pub fn scorer(&self) -> &dyn SentimentScorer {
        self.scorer.as_ref()
    }

    /// Process one batch. Always returns an outcome; batch-fatal errors end in
    /// `Failed(stage)` and nothing reaches the store.
    #[instrument(skip(self, buffer), fields(rows = buffer.len(), strategy = %self.scorer.strategy()))]
    pub fn run(&self, source: &str, buffer: &TabularBuffer) -> IngestOutcome {
        let mut outcome = IngestOutcome::new(source, buffer.len());
        info!("📥 Received batch {} from {}", outcome.batch_id, source);
        metrics::pipeline::batch_received(buffer.len());
        let t_start = std::time::Instant::now();

        // Reconcile every row before anything is scored or written.
        let mut records: Vec<CanonicalRecord> = Vec::with_capacity(buffer.len());
        for (row_index, row) in buffer.rows().iter().enumerate() {
            match self.reconciler.reconcile(row) {
                Ok(reconciled) => {
                    for warning in reconciled.warnings {
                        warn!(row_index, "{}", warning);
                        outcome.warnings.push(RowError::row(row_index, warning.to_string()));
                    }
                    records.push(reconciled.record);
                }
                Err(e) => {
                    error!(row_index, "schema reconciliation failed: {}", e);
                    outcome.fail_batch(Stage::Reconcile, RowError::row(row_index, e.to_string()), false);
                    return self.report(outcome, t_start);
                }
            }
        }
        outcome.state = PipelineState::Reconciled;

        for record in &mut records {
            record.review_text = normalize(Some(&record.review_text));
            record.sentiment = self.scorer.score(&record.review_text);
            metrics::score::record_scored(self.scorer.strategy(), record.sentiment);
        }
        outcome.state = PipelineState::Scored;

        let batch_key = self.dedupe_batches.then(|| compute_batch_key(&self.schema.table, source, buffer));
        BatchPersister::new(self.connector.as_ref(), &self.schema).persist_into(
            &records,
            batch_key.as_deref(),
            &mut outcome,
        );

        self.report(outcome, t_start)
    }

    fn report(&self, mut outcome: IngestOutcome, t_start: std::time::Instant) -> IngestOutcome {
        outcome.finish();
        metrics::pipeline::batch_finished(outcome.is_success(), t_start.elapsed().as_secs_f64());
        match outcome.failed_stage() {
            None => info!(
                "✅ Batch {} reported: {}/{} written, {} failed",
                outcome.batch_id, outcome.rows_written, outcome.rows_total, outcome.rows_failed
            ),
            Some(stage) => error!(
                "💥 Batch {} failed at {} (retryable: {})",
                outcome.batch_id, stage, outcome.retryable
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{StoreSession, WriteFault};
    use crate::domain::CanonicalField;
    use crate::error::Result;
    use crate::pipeline::ingestion::{RawRow, RawValue};
    use crate::pipeline::processing::reconcile::AliasTable;
    use crate::pipeline::processing::sentiment::LexiconScorer;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        committed: Arc<Mutex<Vec<CanonicalRecord>>>,
        acquisitions: Arc<Mutex<usize>>,
    }

    struct RecorderSession {
        owner: Recorder,
        pending: Vec<CanonicalRecord>,
    }

    impl StoreConnector for Recorder {
        fn acquire(&self, _schema: &TargetSchema) -> Result<Box<dyn StoreSession>> {
            *self.acquisitions.lock().unwrap() += 1;
            Ok(Box::new(RecorderSession {
                owner: self.clone(),
                pending: Vec::new(),
            }))
        }
    }

    impl StoreSession for RecorderSession {
        fn insert(&mut self, _schema: &TargetSchema, record: &CanonicalRecord) -> std::result::Result<(), WriteFault> {
            self.pending.push(record.clone());
            Ok(())
        }
        fn batch_recorded(&mut self, _key: &str) -> std::result::Result<bool, WriteFault> {
            Ok(false)
        }
        fn record_batch(&mut self, _key: &str, _source: &str, _rows: usize) -> std::result::Result<(), WriteFault> {
            Ok(())
        }
        fn commit(self: Box<Self>) -> std::result::Result<(), WriteFault> {
            self.owner.committed.lock().unwrap().extend(self.pending);
            Ok(())
        }
        fn rollback(self: Box<Self>) -> std::result::Result<(), WriteFault> {
            Ok(())
        }
    }

    fn orchestrator(store: &Recorder) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            SchemaReconciler::new(AliasTable::default(), vec![CanonicalField::Title]),
            Box::new(LexiconScorer::default()),
            TargetSchema::reviews(),
            Box::new(store.clone()),
        )
    }

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn rows_are_normalized_and_scored_before_persisting() {
        let store = Recorder::default();
        let buffer = TabularBuffer::from_rows(vec![
            RawRow::new().with("Title", text("A")).with("Review", text(" great\ngreat ")),
            RawRow::new().with("Title", text("B")).with("Review", RawValue::Null),
        ]);
        let outcome = orchestrator(&store).run("upload.csv", &buffer);

        assert_eq!(outcome.state, PipelineState::Reported);
        assert_eq!(outcome.rows_written, 2);
        let committed = store.committed.lock().unwrap();
        assert_eq!(committed[0].review_text, "great great");
        assert_eq!(committed[0].sentiment, 1.0);
        assert_eq!(committed[1].review_text, "");
        assert_eq!(committed[1].sentiment, 0.0);
    }

    #[test]
    fn schema_error_fails_before_any_store_access() {
        let store = Recorder::default();
        let buffer = TabularBuffer::from_rows(vec![
            RawRow::new().with("Title", text("A")),
            RawRow::new().with("Review", text("no title column")),
        ]);
        let outcome = orchestrator(&store).run("upload.csv", &buffer);

        assert_eq!(outcome.state, PipelineState::Failed(Stage::Reconcile));
        assert_eq!(outcome.rows_failed, 2);
        assert_eq!(outcome.errors[0].row_index, Some(1));
        assert!(!outcome.retryable);
        assert_eq!(*store.acquisitions.lock().unwrap(), 0);
    }

    #[test]
    fn coercion_problems_surface_as_warnings() {
        let store = Recorder::default();
        let buffer = TabularBuffer::from_rows(vec![RawRow::new()
            .with("Title", text("A"))
            .with("Number of review", text("n/a reviews"))]);
        let outcome = orchestrator(&store).run("upload.csv", &buffer);

        assert!(outcome.is_success());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].row_index, Some(0));
    }
}
