use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use review_ingest::app::{IngestUseCase, TriggerResponse};
use review_ingest::config::Config;
use review_ingest::constants::{DEFAULT_CONFIG_PATH, DEFAULT_LOG_DIR};
use review_ingest::infra::SqliteConnector;
use review_ingest::logging;
use review_ingest::observability;
use review_ingest::pipeline::ingestion::{InputFormat, TabularBuffer};
use review_ingest::pipeline::processing::normalize::normalize;

#[derive(Parser)]
#[command(name = "review_ingest")]
#[command(about = "Restaurant review ingestion: reconcile, score and persist review batches")]
#[command(version = "0.1.0")]
struct Cli {
    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    metrics_addr: Option<SocketAddr>,

    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one or more review files, one batch per file
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Input format; guessed from the file extension when omitted
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Create the configured target table
    InitDb,
    /// Print the configured scorer's polarity for a piece of text
    Score { text: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for InputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Csv => InputFormat::Csv,
            FormatArg::Json => InputFormat::Json,
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(Path::new(DEFAULT_LOG_DIR))?;
    observability::init(cli.metrics_addr)?;

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env_overrides()?;

    match cli.command {
        Commands::Ingest { files, format } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start runtime")?;
            runtime.block_on(run_ingest(Arc::new(config), files, format.map(InputFormat::from)))
        }
        Commands::InitDb => {
            let schema = config.target_schema()?;
            SqliteConnector::new(config.database.clone()).init_schema(&schema)?;
            println!("✅ Table '{}' ready in {}", schema.table, config.database.path.display());
            Ok(())
        }
        Commands::Score { text } => {
            let use_case = IngestUseCase::from_config(&config)?;
            let scorer = use_case.orchestrator().scorer();
            println!("{} {:.4}", scorer.strategy(), scorer.score(&normalize(Some(&text))));
            Ok(())
        }
    }
}

/// One pipeline per file on the blocking pool; each worker has its own store session.
async fn run_ingest(config: Arc<Config>, files: Vec<PathBuf>, format: Option<InputFormat>) -> anyhow::Result<()> {
    info!("🚀 Ingesting {} file(s)", files.len());
    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let config = config.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let result = ingest_file(&config, &path, format);
            (path, result)
        }));
    }

    let mut failed = 0;
    for handle in handles {
        let (path, result) = handle.await.context("ingest worker panicked")?;
        match result {
            Ok(response) => {
                println!("{}", serde_json::to_string_pretty(&response)?);
                if !response.is_success() {
                    failed += 1;
                }
            }
            Err(e) => {
                error!("❌ {}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} batch(es) failed", failed);
    }
    Ok(())
}

fn ingest_file(config: &Config, path: &Path, format: Option<InputFormat>) -> anyhow::Result<TriggerResponse> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let format = format.unwrap_or_else(|| InputFormat::from_path(path));
    let buffer = TabularBuffer::from_bytes(&bytes, format)
        .with_context(|| format!("decoding {}", path.display()))?;
    let use_case = IngestUseCase::from_config(config)?;
    Ok(use_case.handle(&path.display().to_string(), &buffer))
}
