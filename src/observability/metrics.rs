//! Metrics for the review ingestion pipeline
//!
//! Recording goes through the `metrics` facade; until a recorder is installed
//! with [`init`] every call is a no-op, which keeps tests and library users quiet.

use std::fmt;
use std::net::SocketAddr;

use tracing::{info, warn};

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Pipeline
    PipelineBatchesReceived,
    PipelineBatchSize,
    PipelineBatchesSucceeded,
    PipelineBatchesFailed,
    PipelineDuration,

    // Reconcile
    ReconcileFieldsDefaulted,
    ReconcileCoercionFailures,

    // Score
    ScoreRecordsScored,
    ScorePolarity,
    ScoreModelUnavailable,

    // Persist
    PersistConnectionFailures,
    PersistRowsWritten,
    PersistRowsRejected,
    PersistBatchesCommitted,
    PersistBatchesRolledBack,
    PersistDuplicateBatches,
    PersistCommitDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PipelineBatchesReceived => "review_pipeline_batches_received_total",
            MetricName::PipelineBatchSize => "review_pipeline_batch_size",
            MetricName::PipelineBatchesSucceeded => "review_pipeline_batches_succeeded_total",
            MetricName::PipelineBatchesFailed => "review_pipeline_batches_failed_total",
            MetricName::PipelineDuration => "review_pipeline_duration_seconds",

            MetricName::ReconcileFieldsDefaulted => "review_reconcile_fields_defaulted_total",
            MetricName::ReconcileCoercionFailures => "review_reconcile_coercion_failures_total",

            MetricName::ScoreRecordsScored => "review_score_records_scored_total",
            MetricName::ScorePolarity => "review_score_polarity",
            MetricName::ScoreModelUnavailable => "review_score_model_unavailable_total",

            MetricName::PersistConnectionFailures => "review_persist_connection_failures_total",
            MetricName::PersistRowsWritten => "review_persist_rows_written_total",
            MetricName::PersistRowsRejected => "review_persist_rows_rejected_total",
            MetricName::PersistBatchesCommitted => "review_persist_batches_committed_total",
            MetricName::PersistBatchesRolledBack => "review_persist_batches_rolled_back_total",
            MetricName::PersistDuplicateBatches => "review_persist_duplicate_batches_total",
            MetricName::PersistCommitDuration => "review_persist_commit_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder, with an HTTP scrape listener when `listen` is set.
pub fn init(listen: Option<SocketAddr>) -> anyhow::Result<()> {
    let mut builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    match listen {
        Some(addr) => {
            builder = builder.with_http_listener(addr);
            builder
                .install()
                .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;
            info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        None => {
            if let Err(e) = builder.install_recorder() {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;

    pub fn batch_received(rows: usize) {
        ::metrics::counter!(MetricName::PipelineBatchesReceived.as_str()).increment(1);
        ::metrics::histogram!(MetricName::PipelineBatchSize.as_str()).record(rows as f64);
    }

    pub fn batch_finished(success: bool, secs: f64) {
        let name = if success {
            MetricName::PipelineBatchesSucceeded
        } else {
            MetricName::PipelineBatchesFailed
        };
        ::metrics::counter!(name.as_str()).increment(1);
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Reconcile Metrics
// ============================================================================

pub mod reconcile {
    use super::MetricName;
    use crate::domain::CanonicalField;

    /// A field had no source column and took its default
    pub fn field_defaulted(field: CanonicalField) {
        ::metrics::counter!(MetricName::ReconcileFieldsDefaulted.as_str(), "field" => field.as_str())
            .increment(1);
    }

    pub fn coercion_failed(field: CanonicalField) {
        ::metrics::counter!(MetricName::ReconcileCoercionFailures.as_str(), "field" => field.as_str())
            .increment(1);
    }
}

// ============================================================================
// Score Metrics
// ============================================================================

pub mod score {
    use super::MetricName;
    use crate::pipeline::processing::sentiment::SentimentStrategy;

    pub fn record_scored(strategy: SentimentStrategy, polarity: f64) {
        let strategy = strategy.to_string();
        ::metrics::counter!(MetricName::ScoreRecordsScored.as_str(), "strategy" => strategy.clone())
            .increment(1);
        ::metrics::histogram!(MetricName::ScorePolarity.as_str(), "strategy" => strategy).record(polarity);
    }

    pub fn model_unavailable() {
        ::metrics::counter!(MetricName::ScoreModelUnavailable.as_str()).increment(1);
    }
}

// ============================================================================
// Persist Metrics
// ============================================================================

pub mod persist {
    use super::MetricName;

    pub fn connection_failed() {
        ::metrics::counter!(MetricName::PersistConnectionFailures.as_str()).increment(1);
    }

    pub fn row_rejected() {
        ::metrics::counter!(MetricName::PersistRowsRejected.as_str()).increment(1);
    }

    pub fn duplicate_batch() {
        ::metrics::counter!(MetricName::PersistDuplicateBatches.as_str()).increment(1);
    }

    pub fn batch_rolled_back() {
        ::metrics::counter!(MetricName::PersistBatchesRolledBack.as_str()).increment(1);
    }

    pub fn batch_committed(written: usize, secs: f64) {
        ::metrics::counter!(MetricName::PersistBatchesCommitted.as_str()).increment(1);
        ::metrics::counter!(MetricName::PersistRowsWritten.as_str()).increment(written as u64);
        ::metrics::histogram!(MetricName::PersistCommitDuration.as_str()).record(secs);
    }
}
