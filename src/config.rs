use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{ENV_DB_PATH, ENV_SENTIMENT_STRATEGY};
use crate::domain::CanonicalField;
use crate::error::{IngestError, Result};
use crate::pipeline::processing::sentiment::lexicon::{DEFAULT_NEGATIVE, DEFAULT_POSITIVE};
use crate::pipeline::processing::sentiment::SentimentStrategy;
use crate::pipeline::storage::{TargetKind, TargetSchema};

/// Deployment configuration. Loaded once per process and treated as read-only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: ConnectionDescriptor,
    pub pipeline: PipelineSettings,
    pub lexicon: LexiconConfig,
    pub model: ModelConfig,
    /// Per-field replacements for the built-in column alias table.
    pub aliases: BTreeMap<CanonicalField, Vec<String>>,
}

/// Where and how to open the review store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionDescriptor {
    pub path: PathBuf,
    pub create_if_missing: bool,
    /// Upper bound on waiting for a competing writer.
    pub busy_timeout_ms: u64,
    /// Create the target table on connect if it does not exist.
    pub ensure_schema: bool,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/reviews.db"),
            create_if_missing: true,
            busy_timeout_ms: 5_000,
            ensure_schema: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub target: TargetKind,
    /// Overrides the target's table name.
    pub table: Option<String>,
    pub sentiment_strategy: SentimentStrategy,
    pub dedupe_batches: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target: TargetKind::default(),
            table: None,
            sentiment_strategy: SentimentStrategy::default(),
            dedupe_batches: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            positive_words: DEFAULT_POSITIVE.iter().map(|s| s.to_string()).collect(),
            negative_words: DEFAULT_NEGATIVE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 2_000,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides, applied once by the process entry point.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            if !path.trim().is_empty() {
                self.database.path = PathBuf::from(path);
            }
        }
        if let Ok(strategy) = std::env::var(ENV_SENTIMENT_STRATEGY) {
            self.pipeline.sentiment_strategy = strategy.parse()?;
        }
        self.validate()
    }

    /// Target table layout, with the configured table name applied.
    pub fn target_schema(&self) -> Result<TargetSchema> {
        let schema = TargetSchema::for_kind(self.pipeline.target);
        match &self.pipeline.table {
            Some(table) => schema.with_table(table),
            None => Ok(schema),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.sentiment_strategy == SentimentStrategy::Model
            && self.model.endpoint.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            return Err(IngestError::Config(
                "sentiment_strategy = \"model\" requires [model] endpoint".into(),
            ));
        }
        Ok(())
    }
}
