use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod downloaders;
mod error;
mod models;
mod progress;
mod scanners;
mod storage;
mod traits;
mod unscramble;
mod utils;

#[cfg(test)]
mod testing;

use crate::config::{Config, SiteProfile, DEFAULT_CONFIG_FILE};
use crate::downloaders::JapscanDownloader;
use crate::models::{DownloadOptions, OutputFormat};
use crate::progress::IndicatifProgress;
use crate::scanners::MangaWalker;
use crate::traits::{PageSource, ProgressObserver};
use crate::utils::HttpClient;

#[derive(Parser, Debug)]
#[command(name = "japscan-downloader")]
#[command(about = "Download manga chapters from JapScan as images, PDF or CBZ")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Destination directory (overrides the configuration file)
    #[arg(short, long)]
    destination_path: Option<String>,

    /// Output format (overrides the configuration file)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Walk the chapters of a manga page from last to first
    #[arg(short, long)]
    reverse: bool,

    /// Keep page images after building the PDF/CBZ
    #[arg(short, long)]
    keep: bool,

    /// Unscramble every page, even without the scrambling marker
    #[arg(short, long)]
    unscramble: bool,

    /// Log level: 0 trace, 1 debug, 2 info, 3 warn, 4 error, 5 critical
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=5))]
    verbose: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    // Load configuration
    let mut config = Config::load(&cli.config_file)?;
    let options = resolve_options(&cli, &mut config);

    debug!("config_file: {:?}", cli.config_file);
    debug!("destination_path: {:?}", options.destination_path);
    debug!("keep: {}", options.keep);
    debug!("reverse: {}", options.reverse);
    debug!("format: {}", options.format);
    debug!("unscramble: {}", options.unscramble);
    debug!("mangas: {:?}", config.mangas);

    let site = Arc::new(SiteProfile::compile(&config.site)?);
    let source: Arc<dyn PageSource> = Arc::new(HttpClient::new(&config.site)?);
    let progress: Arc<dyn ProgressObserver> = Arc::new(IndicatifProgress::new());

    let downloader = JapscanDownloader::new(source.clone(), site.clone(), options.clone(), progress.clone());
    let walker = MangaWalker::new(source, site, options.reverse, progress);

    if config.mangas.is_empty() {
        warn!("No mangas configured in {:?}", cli.config_file);
    }

    for target in &config.mangas {
        let summary = walker.walk(target, &downloader).await?;
        info!(
            "Done: {} chapters, {} pages, {} pages unavailable",
            summary.chapters, summary.pages, summary.skipped_pages
        );
    }

    Ok(())
}

/// Command line values win over the configuration file.
fn resolve_options(cli: &Cli, config: &mut Config) -> DownloadOptions {
    if let Some(destination_path) = &cli.destination_path {
        config.destination_path = destination_path.clone();
    }
    if let Some(format) = cli.format {
        config.format = format;
    }

    DownloadOptions {
        destination_path: PathBuf::from(&config.destination_path),
        format: config.format,
        reverse: cli.reverse,
        keep: cli.keep,
        unscramble: cli.unscramble,
    }
}

fn log_level(verbose: Option<u8>) -> &'static str {
    match verbose {
        None => "warn",
        Some(0) => "trace",
        Some(1) => "debug",
        Some(2) => "info",
        Some(3) => "warn",
        Some(_) => "error",
    }
}

fn init_logging(verbose: Option<u8>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("japscan_downloader={}", log_level(verbose))));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
