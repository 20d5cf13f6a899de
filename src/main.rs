//! SqlSage - LLM-assisted SQL analyzer
//!
//! Thin CLI shim over [`sqlsage::analysis::Coordinator`]: read SQL, run the
//! enabled analysis dimensions, print the composite report as JSON.

use clap::Parser;
use sqlsage::analysis::{AnalysisMode, Coordinator};
use sqlsage::config::AppConfig;
use sqlsage::provider::HttpTextGenerator;
use sqlsage::resilience::ResilientExecutor;
use sqlsage::{log_error, log_info, logging};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Analyze a SQL file (use "-" to read from stdin)
    Analyze {
        /// SQL file path, or "-" for stdin
        input: String,

        /// Comma-separated dimensions to run (default: all)
        #[arg(long, value_delimiter = ',')]
        dimensions: Vec<String>,

        /// Run dimensions one after another instead of in parallel
        #[arg(long)]
        sequential: bool,
    },

    /// Verify connectivity with the configured model provider
    Check,
}

#[derive(Parser, Debug)]
#[command(name = "sqlsage")]
#[command(version = "0.1.0")]
#[command(about = "LLM-assisted SQL analyzer", long_about = None)]
struct Args {
    /// Configuration file path (overrides defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref())?;
    config.validate()?;

    init_logging(args.verbose, config.debug);

    tracing::info!(
        "Using {} at {} (model {})",
        config.model.provider,
        config.model.url,
        config.model.model
    );

    let generator = match HttpTextGenerator::new(config.model.clone()) {
        Ok(generator) => Arc::new(generator),
        Err(e) => {
            log_error!("Failed to initialize model provider: {}", e);
            log_error!("For Ollama, make sure it's running: ollama serve");
            log_error!("For other providers, check your API key configuration.");
            return Err(e.into());
        }
    };

    match args.command {
        Command::Check => {
            generator.validate_connection().await?;
            log_info!("Provider reachable: {} at {}", config.model.provider, config.model.url);
            Ok(())
        }
        Command::Analyze {
            input,
            dimensions,
            sequential,
        } => {
            let sql = read_sql(&input)?;
            if sql.trim().is_empty() {
                anyhow::bail!("no SQL to analyze");
            }

            let executor = Arc::new(ResilientExecutor::new(
                config.resilience.clone(),
                config.breaker.clone(),
            ));
            let coordinator = Coordinator::new(generator, executor, &config.resilience);

            let mode = if sequential {
                AnalysisMode::Sequential
            } else {
                AnalysisMode::Parallel
            };

            let report = coordinator.analyze(&sql, &dimensions, mode).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.succeeded() == 0 {
                anyhow::bail!("no analysis dimension produced a result");
            }
            Ok(())
        }
    }
}

fn read_sql(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut sql = String::new();
        std::io::stdin().read_to_string(&mut sql)?;
        Ok(sql)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}

fn init_logging(verbose: bool, debug_mode: bool) {
    // File log always on; console level depends on flags
    let _ = logging::init_logger();

    let filter = if verbose || debug_mode {
        "sqlsage=debug,info"
    } else {
        "sqlsage=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
