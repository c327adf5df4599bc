//! CLI entry point for the storm severity pipeline.
//!
//! Provides subcommands for downloading the yearly storm-event files,
//! preprocessing them, fitting the archetype model and ranking locations.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use storm_severity::{
    config::PipelineConfig,
    fetch::{BasicClient, download_years},
    output::DataLayout,
    pipeline::Pipeline,
};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "storm_severity")]
#[command(about = "Rank US locations by storm-event severity", long_about = None)]
struct Cli {
    /// JSON pipeline config; defaults are used for missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the config's data directory
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct PreprocessArgs {
    /// Download missing raw files before cleaning
    #[arg(long, default_value_t = false)]
    download: bool,

    /// Re-clean years even when a cleaned table exists
    #[arg(long, default_value_t = false)]
    clean: bool,

    /// First year to process (overrides the config)
    #[arg(long)]
    start_year: Option<i32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the yearly details files
    Download {
        /// Download even when the year's file is already present
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Clean every year, compute global statistics and normalize
    Preprocess(PreprocessArgs),
    /// Fit the archetype model on the normalized tables
    Cluster,
    /// Label every year and write the severity table
    Rank,
    /// Run every stage in order
    Run(PreprocessArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/storm_severity.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("storm_severity.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Download { force } => {
            download(&config, &config.years(), force).await?;
        }
        Commands::Preprocess(args) => {
            let (pipeline, years) = prepare(config, args).await?;
            blocking(move || pipeline.preprocess(&years, args.clean).map(|_| ())).await?;
        }
        Commands::Cluster => {
            let pipeline = Pipeline::new(config)?;
            blocking(move || {
                let mut rng = pipeline.rng();
                pipeline.cluster(&mut rng).map(|_| ())
            })
            .await?;
        }
        Commands::Rank => {
            let pipeline = Pipeline::new(config)?;
            blocking(move || pipeline.rank().map(|_| ())).await?;
        }
        Commands::Run(args) => {
            let (pipeline, years) = prepare(config, args).await?;
            blocking(move || pipeline.run(&years, args.clean).map(|_| ())).await?;
        }
    }

    Ok(())
}

/// Applies the year override, downloads if requested and builds the pipeline.
async fn prepare(
    mut config: PipelineConfig,
    args: PreprocessArgs,
) -> Result<(Pipeline, Vec<i32>)> {
    if let Some(year) = args.start_year {
        config.first_year = year;
    }
    let pipeline = Pipeline::new(config)?;
    let years = pipeline.config().years();
    info!(
        first = pipeline.config().first_year,
        last = pipeline.config().last_year,
        "Year range"
    );
    if args.download {
        download(pipeline.config(), &years, false).await?;
    }
    Ok((pipeline, years))
}

/// Downloads the raw details file of every year into the raw directory.
#[tracing::instrument(skip(config, years), fields(years = years.len()))]
async fn download(config: &PipelineConfig, years: &[i32], force: bool) -> Result<()> {
    let client = BasicClient::new()?;
    let dir = DataLayout::new(&config.data_dir).raw_dir();
    let fetched = download_years(&client, &config.source_url, &dir, years, force).await?;
    info!(fetched, dir = %dir.display(), "Download complete");
    Ok(())
}

/// Runs a CPU-bound stage off the async runtime.
async fn blocking<F>(stage: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(stage)
        .await
        .context("pipeline stage panicked")?
}
