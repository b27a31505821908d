use tracing::{info, instrument, warn};

use super::TargetSchema;
use crate::app::ports::{StoreConnector, StoreSession, WriteFault};
use crate::domain::{CanonicalRecord, IngestOutcome, PipelineState, RowError, Stage};
use crate::observability::metrics;

/// Writes one batch per transaction with per-row failure isolation.
pub struct BatchPersister<'a> {
    connector: &'a dyn StoreConnector,
    schema: &'a TargetSchema,
}

impl<'a> BatchPersister<'a> {
    pub fn new(connector: &'a dyn StoreConnector, schema: &'a TargetSchema) -> Self {
        Self { connector, schema }
    }

    /// Persist a batch with no idempotency key and return its outcome.
    pub fn persist(&self, records: &[CanonicalRecord]) -> IngestOutcome {
        let mut outcome = IngestOutcome::new(self.schema.table.clone(), records.len());
        self.persist_into(records, None, &mut outcome);
        outcome.finish();
        outcome
    }

    /// Persist `records` and fold the result into `outcome`.
    ///
    /// Row-level store rejections are recorded and the batch continues. A failure
    /// to connect, or a fault that leaves the session unusable, rolls everything
    /// back and fails the batch as retryable. The transaction commits exactly once.
    #[instrument(skip_all, fields(table = %self.schema.table, rows = records.len()))]
    pub fn persist_into(&self, records: &[CanonicalRecord], batch_key: Option<&str>, outcome: &mut IngestOutcome) {
        let t_start = std::time::Instant::now();
        let mut session = match self.connector.acquire(self.schema) {
            Ok(session) => session,
            Err(e) => {
                warn!("could not acquire store connection: {}", e);
                metrics::persist::connection_failed();
                outcome.fail_batch(Stage::Persist, RowError::batch(e.to_string()), e.is_retryable());
                return;
            }
        };

        if let Some(key) = batch_key {
            match session.batch_recorded(key) {
                Ok(true) => {
                    info!(batch_key = key, "batch already ingested, skipping");
                    if let Err(fault) = session.rollback() {
                        warn!("rollback after duplicate check failed: {}", fault);
                    }
                    metrics::persist::duplicate_batch();
                    outcome.duplicate = true;
                    outcome.state = PipelineState::Persisted;
                    return;
                }
                Ok(false) => {}
                Err(fault) => {
                    abort(session, outcome, RowError::batch(fault.to_string()));
                    return;
                }
            }
        }

        let mut written = 0;
        let mut row_errors = Vec::new();
        for (row_index, record) in records.iter().enumerate() {
            match session.insert(self.schema, record) {
                Ok(()) => written += 1,
                Err(WriteFault::Row(message)) => {
                    warn!(row_index, "row rejected by store: {}", message);
                    metrics::persist::row_rejected();
                    row_errors.push(RowError::row(row_index, message));
                }
                Err(WriteFault::Fatal(message)) => {
                    warn!(row_index, "store fault mid-batch: {}", message);
                    outcome.errors.append(&mut row_errors);
                    abort(session, outcome, RowError::row(row_index, message));
                    return;
                }
            }
        }

        if let Some(key) = batch_key {
            if let Err(fault) = session.record_batch(key, &outcome.source, written) {
                outcome.errors.append(&mut row_errors);
                abort(session, outcome, RowError::batch(fault.to_string()));
                return;
            }
        }

        if let Err(fault) = session.commit() {
            warn!("commit failed: {}", fault);
            outcome.errors.append(&mut row_errors);
            metrics::persist::batch_rolled_back();
            outcome.fail_batch(Stage::Persist, RowError::batch(format!("commit failed: {}", fault)), true);
            return;
        }

        outcome.rows_written = written;
        outcome.rows_failed = row_errors.len();
        outcome.errors.append(&mut row_errors);
        outcome.state = PipelineState::Persisted;

        metrics::persist::batch_committed(written, t_start.elapsed().as_secs_f64());
        info!(
            written,
            failed = outcome.rows_failed,
            "committed batch to {}",
            self.schema.table
        );
    }
}

fn abort(session: Box<dyn StoreSession>, outcome: &mut IngestOutcome, error: RowError) {
    if let Err(fault) = session.rollback() {
        warn!("rollback failed, connection closed without commit: {}", fault);
    }
    metrics::persist::batch_rolled_back();
    outcome.fail_batch(Stage::Persist, error, true);
}
