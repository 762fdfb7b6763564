//! # VOOM Clip
//!
//! Clips a LINE VOOM post into Notion: drives a headless browser through the
//! post to harvest its text and images, downloads the images, sends them to
//! a vision model for description, converts the post text into structured
//! blocks, and writes everything as one Notion page.
//!
//! ## Usage
//!
//! ```sh
//! voom_clip https://voom.line.me/post/1172133110257348439
//! ```
//!
//! ## Architecture
//!
//! One request flows through a finite state machine:
//! 1. **Extracting**: a scoped browser session harvests text and image URLs
//! 2. **Fetching**: images are downloaded with content-hash dedup
//! 3. **Analyzing**: a vision model describes the images (best effort)
//! 4. **Converting**: the text body becomes a typed block tree
//! 5. **Persisting**: the page is created and its URL returned
//!
//! Page-structure volatility is quarantined in a selector registry that can
//! be swapped out with `--selectors` when VOOM redesigns.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod blocks;
mod cli;
mod error;
mod fetcher;
mod models;
mod notion;
mod pipeline;
mod selectors;
mod session;
mod utils;
mod vision;

use cli::Cli;
use fetcher::MediaFetcher;
use notion::NotionStore;
use pipeline::Orchestrator;
use selectors::SelectorRegistry;
use session::VoomSession;
use utils::ensure_writable_dir;
use vision::GeminiVision;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("voom_clip starting up");

    let args = Cli::parse();
    debug!(?args.media_dir, ?args.selectors, "Parsed CLI arguments");

    // Early check: the media directory must be writable before a browser
    // session is spent on the request.
    if let Err(e) = ensure_writable_dir(&args.media_dir).await {
        error!(
            path = %args.media_dir,
            error = %e,
            "Media directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    // --- Selector registry: built-in, or a remediation file ---
    let registry = match &args.selectors {
        Some(path) => {
            let yaml = tokio::fs::read_to_string(path).await?;
            let registry = SelectorRegistry::from_yaml(&yaml)?;
            info!(%path, "Loaded selector registry");
            registry
        }
        None => SelectorRegistry::default(),
    };

    let request_timeout = Duration::from_secs(args.request_timeout_secs);

    let extractor = VoomSession::new(&registry, Duration::from_secs(args.nav_timeout_secs))?;
    let fetcher = MediaFetcher::new(&args.media_dir, request_timeout)?;
    let analyzer = GeminiVision::new(
        args.gemini_api_key.clone(),
        args.gemini_model.clone(),
        args.prompt
            .clone()
            .unwrap_or_else(|| vision::DEFAULT_PROMPT.to_string()),
        request_timeout,
    )?;
    let store = NotionStore::new(
        args.notion_token.clone(),
        &args.notion_parent_page,
        request_timeout,
    )?;

    let orchestrator = Orchestrator::new(extractor, fetcher, analyzer, store, args.max_sessions);

    match orchestrator.run(&args.url).await {
        Ok(report) => {
            let elapsed = start_time.elapsed();
            info!(
                secs = elapsed.as_secs(),
                assets = report.asset_count,
                analysis = report.analysis_included,
                retries = report.session_retries,
                states = ?report.state_trace.iter().map(|s| s.name()).collect::<Vec<_>>(),
                page_url = %report.page_url,
                "Clip complete"
            );
            println!("{}", report.page_url);
            Ok(())
        }
        Err(failure) => {
            error!(
                error = %failure.error,
                retries = failure.session_retries,
                states = ?failure.state_trace.iter().map(|s| s.name()).collect::<Vec<_>>(),
                "Clip failed"
            );
            eprintln!("{}", failure.error.user_message());
            Err(Box::new(failure.error) as Box<dyn Error>)
        }
    }
}
