//! iotad entrypoint: trains models on, or scores, the configured packet sources.
//! Ctrl+C ends the current stream early; reporters still get their final call.

use clap::{Parser, Subcommand};
use iotad::{logging::StructuredLogger, Pipeline, PipelineConfig, Registry};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{info, info_span, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "iotad", version, about = "Packet-feature aggregation and anomaly detection")]
struct Cli {
    /// Pipeline configuration (JSON)
    #[arg(long, env = "IOTAD_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit and store every configured model
    Train,
    /// Score records with stored models and feed the reporters
    Predict,
    /// Count preprocessed records
    Count {
        /// Stop after this many records
        #[arg(long)]
        limit: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = PipelineConfig::load(&cli.config)?;

    StructuredLogger::init(config.log.json, &config.log.level);

    let _run = info_span!("run", run_id = %Uuid::new_v4()).entered();
    info!(config = %cli.config.display(), sources = config.data_sources.len(), "iotad starting");

    let pipeline = Pipeline::new(config, Registry::with_defaults());
    let stop = pipeline.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }

    match cli.command {
        Command::Train => {
            pipeline.train()?;
            info!("training complete");
        }
        Command::Predict => {
            let records = pipeline.predict()?;
            info!(records, "prediction complete");
        }
        Command::Count { limit } => {
            let records = pipeline.count(limit)?;
            println!("{}", records);
        }
    }
    Ok(())
}
