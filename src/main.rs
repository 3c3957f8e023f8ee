//! Binary entry point: resolve paths, bring up logging, the catalog and the
//! segmentation worker, then drive the Ratatui event loop until the user
//! exits.
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use merlinsbag::state::Route;
use merlinsbag::{run_app, App, Catalog, Paths, SegmentationWorker, Settings, ThresholdSegmenter};

const LOG_ENV: &str = "MERLINSBAG_LOG";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the catalog database and images
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Settings file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,
    /// Photos to import right away
    images: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = Paths::resolve(cli.data_dir, cli.config)?;
    fs::create_dir_all(&paths.data_dir).with_context(|| {
        format!("failed to create data directory {}", paths.data_dir.display())
    })?;
    init_logging(&paths)?;

    let settings = Settings::load(&paths.config_file)?;
    let catalog = Catalog::open(&paths)?;
    let worker = SegmentationWorker::spawn(Box::new(ThresholdSegmenter::default()))?;
    info!(data_dir = %paths.data_dir.display(), "starting");

    let mut app = App::new(catalog, paths, settings, worker);
    if !cli.images.is_empty() {
        app.open(Route::AddArticle {
            sources: cli.images,
            target_article: None,
        })?;
    }
    run_app(&mut app)
}

/// Log to a file in the data directory; the terminal belongs to the UI.
fn init_logging(paths: &Paths) -> Result<()> {
    let log_file = paths.log_file();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
