use serde::Serialize;
use serde_json::json;

use crate::config::Config;
use crate::domain::IngestOutcome;
use crate::error::{IngestError, Result};
use crate::infra::{HttpPolarityModel, SqliteConnector};
use crate::pipeline::ingestion::TabularBuffer;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::pipeline::processing::reconcile::{AliasTable, SchemaReconciler};
use crate::pipeline::processing::sentiment::{LexiconScorer, ModelScorer, SentimentScorer, SentimentStrategy};

/// What the external trigger sends back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl TriggerResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Use case for ingesting one uploaded review batch
pub struct IngestUseCase {
    orchestrator: PipelineOrchestrator,
}

impl IngestUseCase {
    pub fn new(orchestrator: PipelineOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Wire the configured scorer, alias table, target and SQLite store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let scorer = build_scorer(config)?;
        let schema = config.target_schema()?;
        let reconciler = SchemaReconciler::new(AliasTable::with_overrides(&config.aliases)?, schema.required.clone());
        let connector = SqliteConnector::new(config.database.clone());

        let orchestrator = PipelineOrchestrator::new(reconciler, scorer, schema, Box::new(connector))
            .with_batch_dedupe(config.pipeline.dedupe_batches);
        Ok(Self::new(orchestrator))
    }

    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.orchestrator
    }

    /// Run the pipeline for one batch and shape the outcome as a trigger response.
    pub fn handle(&self, source_key: &str, buffer: &TabularBuffer) -> TriggerResponse {
        let outcome = self.orchestrator.run(source_key, buffer);
        respond(source_key, outcome)
    }
}

fn build_scorer(config: &Config) -> Result<Box<dyn SentimentScorer>> {
    match config.pipeline.sentiment_strategy {
        SentimentStrategy::Lexicon => Ok(Box::new(LexiconScorer::new(
            &config.lexicon.positive_words,
            &config.lexicon.negative_words,
        ))),
        SentimentStrategy::Model => {
            let endpoint = config
                .model
                .endpoint
                .as_deref()
                .ok_or_else(|| IngestError::Config("model strategy requires [model] endpoint".into()))?;
            let model = HttpPolarityModel::new(endpoint, config.model.timeout_ms)
                .map_err(|e| IngestError::Config(format!("{:#}", e)))?;
            Ok(Box::new(ModelScorer::new(Box::new(model))))
        }
    }
}

fn respond(source_key: &str, outcome: IngestOutcome) -> TriggerResponse {
    let (status_code, message) = match outcome.failed_stage() {
        Some(stage) => {
            let first = outcome
                .errors
                .first()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown error");
            (500, format!("Failed to ingest {} at stage {}: {}", source_key, stage, first))
        }
        None => {
            let mut message = format!(
                "Successfully processed {} of {} rows from {}",
                outcome.rows_written, outcome.rows_total, source_key
            );
            if outcome.duplicate {
                message.push_str(" (batch already ingested)");
            } else if outcome.rows_failed > 0 {
                message.push_str(&format!(" ({} rows failed)", outcome.rows_failed));
            }
            (200, message)
        }
    };
    TriggerResponse {
        status_code,
        body: json!({ "message": message, "outcome": outcome }),
    }
}
