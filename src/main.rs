mod browser;
mod link_map;
mod orchestrator;
mod page_scraper;
mod target;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use browser::{BrowserError, ChromiumSession, LaunchOptions};
use clap::Parser;
use jiff::Timestamp;
use link_map::PersistError;
use orchestrator::Orchestrator;
use page_scraper::{PageScraper, ScrollSettler};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(version, about = "Collects product page links from e-commerce sites")]
pub struct Cli {
    /// File with one target URL per line; defaults to the built-in site list
    #[arg(short, long)]
    targets: Option<PathBuf>,
    #[arg(short, long, default_value = "product_links.json")]
    output: PathBuf,
    /// Pages scraped at the same time
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,
    /// Attempts per URL before giving up
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..))]
    max_retries: u8,
    #[arg(long, default_value_t = 120)]
    navigation_timeout_secs: u64,
    #[arg(long, default_value_t = 5)]
    probe_timeout_secs: u64,
    /// Element whose presence marks a scroll as loaded
    #[arg(long, default_value = "footer")]
    probe_selector: String,
    /// Scroll iterations before extracting anyway; 0 scrolls until the page stops growing
    #[arg(long, default_value_t = 50)]
    max_scrolls: u32,
    /// Chrome or Chromium executable
    #[arg(long)]
    chrome: Option<PathBuf>,
    #[arg(long)]
    headful: bool,
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Error, Debug)]
enum RunError {
    #[error("could not read targets from {}: {source}", path.display())]
    Targets {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

async fn run(args: Cli) -> Result<(), RunError> {
    let started = Timestamp::now();
    let targets = match &args.targets {
        Some(path) => target::load_target_list(path)
            .await
            .map_err(|source| RunError::Targets {
                path: path.clone(),
                source,
            })?,
        None => target::default_targets(),
    };
    tracing::info!("Scraping {} targets", targets.len());

    let session = ChromiumSession::launch(&LaunchOptions {
        executable: args.chrome.clone(),
        headful: args.headful,
    })
    .await?;

    let orchestrator = Orchestrator {
        scraper: PageScraper {
            max_retries: args.max_retries,
            navigation_timeout: Duration::from_secs(args.navigation_timeout_secs),
            settler: ScrollSettler {
                probe_selector: args.probe_selector.clone(),
                probe_timeout: Duration::from_secs(args.probe_timeout_secs),
                max_iterations: (args.max_scrolls > 0).then_some(args.max_scrolls),
            },
            ..PageScraper::new(session.clone())
        },
        concurrency_limit: args.concurrency as usize,
    };
    let scraped = orchestrator.run_to_completion(&targets).await;
    drop(orchestrator);
    let closed = session.shutdown().await;
    let links = scraped?;
    closed?;

    links.save(&args.output).await?;
    println!(
        "Scraping completed in {:#}. {} product links from {} domains saved to {}",
        Timestamp::now().duration_since(started),
        links.total_links(),
        links.domains(),
        args.output.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("product_link_scraper={}", args.log_level))
        .compact()
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
