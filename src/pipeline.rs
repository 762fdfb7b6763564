//! Pipeline orchestrator: one finite state machine per request.
//!
//! Sequences extraction, media fetching, vision analysis, block conversion,
//! and the document write with explicit failure transitions:
//!
//! ```text
//! Received -> Extracting -> Fetching -> Analyzing -> Converting -> Persisting -> Completed
//!                 |             |           |            |             |
//!                 +------------ +-----------+------------+-------------+--> Failed{reason}
//! ```
//!
//! Side effects are strictly ordered; no step starts before its predecessor
//! finished. Within a run everything is sequential; across runs, concurrent
//! pipelines are bounded by a semaphore since each one owns a full browser
//! session. The run result carries the visited state trace and the session
//! retry count, so retry behavior is observable rather than a hidden loop.
//!
//! Retry policy lives here and nowhere else: exactly one re-attempt after a
//! `SessionClosed` extraction, immediately, and nothing else is ever retried.
//! A second crash, like every other error, surfaces verbatim.

use crate::blocks;
use crate::error::{ExtractError, PipelineError};
use crate::fetcher::MediaFetch;
use crate::models::{MediaAsset, PageDraft, PostReference};
use crate::notion::DocumentStore;
use crate::session::PostExtractor;
use crate::utils::truncate_for_log;
use crate::vision::VisionAnalyzer;
use chrono::Local;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Extracting,
    Fetching,
    Analyzing,
    Converting,
    Persisting,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Extracting => "extracting",
            PipelineState::Fetching => "fetching",
            PipelineState::Analyzing => "analyzing",
            PipelineState::Converting => "converting",
            PipelineState::Persisting => "persisting",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        }
    }
}

/// Successful run summary.
#[derive(Debug)]
pub struct PipelineReport {
    pub page_url: String,
    pub asset_count: usize,
    pub analysis_included: bool,
    pub state_trace: Vec<PipelineState>,
    pub session_retries: u32,
}

/// Terminal failure with the same observability as a success.
#[derive(Debug)]
pub struct PipelineFailure {
    pub error: PipelineError,
    pub state_trace: Vec<PipelineState>,
    pub session_retries: u32,
}

/// State log shared by both outcomes.
struct Trace {
    states: Vec<PipelineState>,
}

impl Trace {
    fn start() -> Self {
        let mut trace = Self { states: Vec::new() };
        trace.enter(PipelineState::Received);
        trace
    }

    fn enter(&mut self, state: PipelineState) {
        info!(state = state.name(), "pipeline state");
        self.states.push(state);
    }

    fn fail(mut self, error: PipelineError, session_retries: u32) -> PipelineFailure {
        self.enter(PipelineState::Failed);
        error!(error = %error, "pipeline failed");
        PipelineFailure {
            error,
            state_trace: self.states,
            session_retries,
        }
    }
}

pub struct Orchestrator<E, F, V, D> {
    extractor: E,
    fetcher: F,
    analyzer: V,
    store: D,
    sessions: Arc<Semaphore>,
}

impl<E, F, V, D> Orchestrator<E, F, V, D>
where
    E: PostExtractor,
    F: MediaFetch,
    V: VisionAnalyzer,
    D: DocumentStore,
{
    /// `max_sessions` caps concurrent pipelines; each run holds one permit
    /// for its whole lifetime because it owns a full browser session.
    pub fn new(extractor: E, fetcher: F, analyzer: V, store: D, max_sessions: usize) -> Self {
        Self {
            extractor,
            fetcher,
            analyzer,
            store,
            sessions: Arc::new(Semaphore::new(max_sessions.max(1))),
        }
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn run(&self, url: &str) -> Result<PipelineReport, PipelineFailure> {
        let _permit = self
            .sessions
            .acquire()
            .await
            .expect("session semaphore never closes");

        let mut trace = Trace::start();
        let mut session_retries = 0u32;

        let post = match PostReference::parse(url) {
            Ok(post) => post,
            Err(e) => return Err(trace.fail(e, session_retries)),
        };

        trace.enter(PipelineState::Extracting);
        let content = loop {
            match self.extractor.extract(&post).await {
                Ok(content) => break content,
                Err(ExtractError::SessionClosed(msg)) if session_retries == 0 => {
                    warn!(reason = %msg, "browser session closed; retrying once");
                    session_retries = 1;
                    trace.enter(PipelineState::Extracting);
                }
                Err(e) => return Err(trace.fail(e.into(), session_retries)),
            }
        };

        // Extraction promises non-empty text or images; enforced again here
        // so nothing empty reaches the collaborators.
        if content.is_empty() {
            return Err(trace.fail(PipelineError::NoMedia, session_retries));
        }

        let assets: Vec<MediaAsset>;
        if content.image_urls.is_empty() {
            debug!("text-only post; skipping media fetch");
            assets = Vec::new();
        } else {
            trace.enter(PipelineState::Fetching);
            let fetched = self
                .fetcher
                .fetch_all(&post.post_id, &content.image_urls)
                .await;
            if fetched.assets.is_empty() && content.text_body.is_empty() {
                return Err(trace.fail(PipelineError::NoMedia, session_retries));
            }
            assets = fetched.assets;
        }

        let analysis = if assets.is_empty() {
            None
        } else {
            trace.enter(PipelineState::Analyzing);
            match self.analyzer.describe(&assets).await {
                Ok(text) => {
                    info!(preview = %truncate_for_log(&text, 120), "vision analysis complete");
                    Some(text)
                }
                Err(e) => {
                    // Reported, not terminal: the page still gets written
                    // with the analysis field absent.
                    warn!(error = %e, "vision analysis failed; continuing without it");
                    None
                }
            }
        };

        trace.enter(PipelineState::Converting);
        let body = blocks::to_blocks(&content.text_body);

        trace.enter(PipelineState::Persisting);
        let stamp = Local::now().format("%Y-%m-%d %H:%M");
        let draft = PageDraft {
            title: format!("{stamp} VOOM {}", post.post_id),
            source_url: post.url.to_string(),
            body,
            analysis,
        };
        let page_url = match self.store.create_page(&draft).await {
            Ok(page_url) => page_url,
            Err(e) => return Err(trace.fail(e.into(), session_retries)),
        };

        trace.enter(PipelineState::Completed);
        Ok(PipelineReport {
            page_url,
            asset_count: assets.len(),
            analysis_included: draft.analysis.is_some(),
            state_trace: trace.states,
            session_retries,
        })
    }
}
