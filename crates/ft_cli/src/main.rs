use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use ft_core::{Error, Result, SourceRegistry, StartupStore, Storage};
use ft_inference::{EngineConfig, ExtractionEngine};
use ft_scrapers::PipelineManager;
use ft_storage::{export, seed};
use ft_web::AppState;

const GEMINI_KEY_ENV: &str = "FT_GEMINI_API_KEY";
const OPENAI_KEY_ENV: &str = "FT_OPENAI_API_KEY";
const GEMINI_MODEL_ENV: &str = "FT_GEMINI_MODEL";
const OPENAI_MODEL_ENV: &str = "FT_OPENAI_MODEL";

/// Duration in compact human form: `30m`, `1h15m`, `90` (plain seconds).
#[derive(Debug, Clone)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    'd' => total_seconds += num * 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                }
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A bare number reads as seconds
        if !current_number.is_empty() {
            match current_number.parse::<u64>() {
                Ok(num) => {
                    total_seconds += num;
                    has_unit = true;
                }
                Err(_) => return Err("Invalid number in duration".to_string()),
            }
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, default_value = "sqlite")]
    storage: String,
    /// Connection string for the sqlite backend
    #[arg(long, default_value = "sqlite://funding.db")]
    db_url: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the discovery pipeline once, or periodically with --interval
    Run {
        /// Only this source (by name). All active sources when omitted.
        #[arg(long)]
        source: Option<String>,
        /// Periodic mode interval (e.g. 1h, 30m, 1h15m)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Serve the query API, optionally running the pipeline on a schedule
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: String,
        /// Background discovery interval (e.g. 1h). Off when omitted.
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// List configured sources
    Sources,
    /// Export all discovered startups as CSV
    Export {
        /// Output file. Writes to stdout when omitted.
        #[arg(long)]
        out: Option<std::path::PathBuf>,
    },
}

fn engine_from_env() -> Result<Arc<ExtractionEngine>> {
    let config = EngineConfig {
        gemini_api_key: std::env::var(GEMINI_KEY_ENV).ok(),
        openai_api_key: std::env::var(OPENAI_KEY_ENV).ok(),
        gemini_model: std::env::var(GEMINI_MODEL_ENV).ok(),
        openai_model: std::env::var(OPENAI_MODEL_ENV).ok(),
    };
    Ok(Arc::new(ft_inference::create_engine(config)?))
}

async fn run_once(
    pipeline: &Arc<PipelineManager>,
    storage: &Arc<dyn Storage>,
    source: &Option<String>,
) -> Result<()> {
    match source {
        Some(name) => {
            let wanted = name.to_lowercase();
            let sources = storage.list_active_sources().await?;
            let source = sources
                .into_iter()
                .find(|s| s.name.to_lowercase() == wanted || s.id == *name)
                .ok_or_else(|| Error::Storage(format!("No active source named '{}'", name)))?;
            match pipeline.run_source(&source).await {
                Some(entry) => info!(
                    source = %source.name,
                    processed = entry.articles_processed,
                    found = entry.startups_found,
                    "Source run finished"
                ),
                None => info!(source = %source.name, "Source already running"),
            }
        }
        None => {
            let summary = pipeline.run_all().await;
            info!(
                sources = summary.sources_run,
                articles = summary.articles_processed,
                startups = summary.startups_found,
                "Run finished"
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let storage = ft_storage::create_storage(&cli.storage, Some(cli.db_url.as_str())).await?;
    storage.health().await?;
    info!("💾 Storage initialized (using {})", cli.storage);
    seed::seed_defaults(&storage).await?;

    match cli.command {
        Commands::Run { source, interval } => {
            let engine = engine_from_env()?;
            let pipeline = PipelineManager::new(storage.clone(), engine);
            match interval {
                Some(HumanDuration(every)) => loop {
                    if let Err(e) = run_once(&pipeline, &storage, &source).await {
                        error!(error = %e, "Run failed");
                    }
                    info!("Waiting {}s before next run", every.as_secs());
                    tokio::time::sleep(every).await;
                },
                None => run_once(&pipeline, &storage, &source).await?,
            }
        }
        Commands::Serve { addr, interval } => {
            let engine = engine_from_env()?;
            let pipeline = PipelineManager::new(storage.clone(), engine);
            if let Some(HumanDuration(every)) = interval {
                let scheduled = pipeline.clone();
                tokio::spawn(async move {
                    loop {
                        scheduled.run_all().await;
                        tokio::time::sleep(every).await;
                    }
                });
                info!("⏰ Background runs every {}s", every.as_secs());
            }
            ft_web::serve(&addr, AppState { storage, pipeline }).await?;
        }
        Commands::Sources => {
            for source in storage.list_sources().await? {
                let kind = if source.is_feed() { "feed" } else { "search" };
                let flag = if source.active { "" } else { " (inactive)" };
                println!("{:<8} {}{}  {}", kind, source.name, flag, source.url);
            }
        }
        Commands::Export { out } => {
            let records = storage.all().await?;
            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)?;
                    export::write_csv(&records, file)?;
                    info!(count = records.len(), path = %path.display(), "Exported startups");
                }
                None => export::write_csv(&records, std::io::stdout())?,
            }
        }
    }

    Ok(())
}
