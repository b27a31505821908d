/// Environment variables read once by the process entry point.
pub const ENV_DB_PATH: &str = "REVIEW_DB_PATH";
pub const ENV_SENTIMENT_STRATEGY: &str = "REVIEW_SENTIMENT_STRATEGY";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "review_ingest.log";
