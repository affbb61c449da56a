use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use scan_cleaner::{pipeline, PipelineConfig, ZeroVariance};

#[derive(Parser)]
#[command(name = "scan-cleaner")]
#[command(about = "Normalize, align and background-correct repeated sensor scans", version)]
struct Cli {
    /// Path to JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Metadata table (.csv, .json or .parquet)
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Raw scans (.json or .parquet)
    #[arg(long)]
    raw: Option<PathBuf>,

    /// Background scans (.json or .parquet)
    #[arg(long)]
    background: Option<PathBuf>,

    /// Output CSV path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Handling of zero-variance columns during normalization
    #[arg(long, value_enum)]
    zero_variance: Option<ZeroVariance>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(path) = self.metadata {
            config.metadata_path = path;
        }
        if let Some(path) = self.raw {
            config.raw_path = path;
        }
        if let Some(path) = self.background {
            config.background_path = path;
        }
        if let Some(path) = self.output {
            config.output_path = path;
        }
        if let Some(policy) = self.zero_variance {
            config.processing.zero_variance = policy;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let config = cli.into_config()?;
    let report = pipeline::run(&config).context("pipeline run failed")?;

    let dropped = report.processed.dropped_sensors();
    if !dropped.is_empty() {
        warn!("{} sensors produced no output: {}", dropped.len(), dropped.join(", "));
    }
    info!(
        "Wrote {} sensors x {} values to {}",
        report.output.rows,
        report.output.columns,
        report.output.path.display()
    );
    println!("Processed data saved to {}", report.output.path.display());
    Ok(())
}
