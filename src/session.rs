//! Browser extraction session for one VOOM post.
//!
//! Each call drives a single scoped headless-browser session through one post
//! URL: navigate, wait for the text container, expand a truncated preview,
//! harvest text and image URLs. The session and its event loop are released
//! on every exit path, success, selector failure, or crash alike; the `Drop`
//! fallback covers cancellation mid-step.
//!
//! Failure classification is part of the contract:
//! - the text-container wait timing out is [`ExtractError::SelectorMiss`],
//!   the designed response to DOM drift, reported with the role name;
//! - a visible login marker is [`ExtractError::AuthRequired`] and is
//!   authoritative even when partial post content rendered;
//! - abrupt session/page termination is [`ExtractError::SessionClosed`],
//!   which this component never retries (retry policy belongs to the
//!   orchestrator).

use crate::error::ExtractError;
use crate::models::{ExtractedContent, PostReference};
use crate::selectors::{RegistryError, SelectorRegistry, SelectorRole};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use itertools::Itertools;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// Seam the orchestrator consumes; pipeline tests swap the browser out.
pub trait PostExtractor {
    async fn extract(&self, post: &PostReference) -> Result<ExtractedContent, ExtractError>;
}

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Settle delay after clicking the "show more" control, long enough for the
/// expanded text to render.
const EXPAND_SETTLE: Duration = Duration::from_millis(300);

/// One-post-per-call extraction session against a selector registry.
///
/// Registry completeness is checked at construction, so an incomplete
/// remediation file is rejected before any browser is launched.
pub struct VoomSession {
    text_container: String,
    image_element: String,
    show_more: String,
    login_marker: String,
    nav_timeout: Duration,
}

impl VoomSession {
    pub fn new(registry: &SelectorRegistry, nav_timeout: Duration) -> Result<Self, RegistryError> {
        Ok(Self {
            text_container: registry.resolve(SelectorRole::PostTextContainer)?.to_string(),
            image_element: registry.resolve(SelectorRole::ImageElement)?.to_string(),
            show_more: registry.resolve(SelectorRole::ShowMoreControl)?.to_string(),
            login_marker: registry.resolve(SelectorRole::LoginMarker)?.to_string(),
            nav_timeout,
        })
    }

    async fn harvest(
        &self,
        scope: &BrowserScope,
        post: &PostReference,
    ) -> Result<ExtractedContent, ExtractError> {
        let page = scope
            .browser()
            .new_page(post.url.as_str())
            .await
            .map_err(|e| ExtractError::SessionClosed(format!("open page: {e}")))?;

        match timeout(self.nav_timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ExtractError::SessionClosed(format!("navigation: {e}"))),
            Err(_) => debug!("navigation wait timed out, continuing to selector wait"),
        }

        let text_attached = self
            .wait_for_attached(&page, &self.text_container)
            .await;

        // A login surface is authoritative regardless of what else rendered.
        if page.find_element(self.login_marker.as_str()).await.is_ok() {
            info!("login marker present, post is walled");
            return Err(ExtractError::AuthRequired);
        }

        if !text_attached {
            ensure_alive(&page, "text container wait").await?;
            return Err(ExtractError::SelectorMiss {
                selector: SelectorRole::PostTextContainer.name().to_string(),
            });
        }

        self.expand_preview(&page).await;

        let text_body = self.read_text(&page).await?;
        let image_urls = self.read_image_urls(&page).await;

        if text_body.is_empty() && image_urls.is_empty() {
            // The container attached but nothing came out of it: a parsing
            // failure, not a genuinely empty post.
            ensure_alive(&page, "content harvest").await?;
            return Err(ExtractError::SelectorMiss {
                selector: SelectorRole::PostTextContainer.name().to_string(),
            });
        }

        info!(
            text_bytes = text_body.len(),
            images = image_urls.len(),
            "extraction complete"
        );
        Ok(ExtractedContent {
            text_body,
            image_urls,
        })
    }

    /// Poll until the expression matches or the bounded wait elapses.
    async fn wait_for_attached(&self, page: &Page, expression: &str) -> bool {
        let deadline = Instant::now() + self.nav_timeout;
        loop {
            if page.find_element(expression).await.is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    /// Click the "show more" control once, if present, so the harvested text
    /// is the full body rather than a truncated preview.
    async fn expand_preview(&self, page: &Page) {
        let Ok(control) = page.find_element(self.show_more.as_str()).await else {
            return;
        };
        match control.click().await {
            Ok(_) => {
                debug!("expanded text preview");
                sleep(EXPAND_SETTLE).await;
            }
            Err(e) => warn!(error = %e, "show-more click failed, harvesting visible text"),
        }
    }

    async fn read_text(&self, page: &Page) -> Result<String, ExtractError> {
        // Re-query rather than reusing the pre-expansion handle; the click
        // may have re-rendered the container.
        let Ok(container) = page.find_element(self.text_container.as_str()).await else {
            ensure_alive(page, "text re-query").await?;
            return Ok(String::new());
        };
        match container.inner_text().await {
            Ok(text) => Ok(text.unwrap_or_default().trim().to_string()),
            Err(e) => {
                warn!(error = %e, "text read failed");
                ensure_alive(page, "text read").await?;
                Ok(String::new())
            }
        }
    }

    /// All image sources in the post's media area, de-duplicated by exact
    /// URL with first-seen order preserved.
    async fn read_image_urls(&self, page: &Page) -> Vec<String> {
        let elements = match page.find_elements(self.image_element.as_str()).await {
            Ok(elements) => elements,
            Err(e) => {
                debug!(error = %e, "no image elements matched");
                return Vec::new();
            }
        };

        let mut urls = Vec::new();
        for element in &elements {
            match image_source(element).await {
                Some(src) => urls.push(src),
                None => debug!("image element without a usable source"),
            }
        }
        urls.into_iter().unique().collect()
    }
}

/// `src`, falling back to `data-src` for lazily-loaded slides.
async fn image_source(element: &Element) -> Option<String> {
    for attr in ["src", "data-src"] {
        if let Ok(Some(value)) = element.attribute(attr).await {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Cheap liveness probe: distinguishes "element genuinely absent" from "the
/// session died underneath us".
async fn ensure_alive(page: &Page, context: &str) -> Result<(), ExtractError> {
    page.url()
        .await
        .map(|_| ())
        .map_err(|e| ExtractError::SessionClosed(format!("{context}: {e}")))
}

impl PostExtractor for VoomSession {
    #[instrument(level = "info", skip_all, fields(url = %post.url))]
    async fn extract(&self, post: &PostReference) -> Result<ExtractedContent, ExtractError> {
        let scope = BrowserScope::launch().await?;
        let result = self.harvest(&scope, post).await;
        scope.close().await;
        result
    }
}

/// Scoped browser: the process and its CDP event loop are released on every
/// exit path. `close` is the explicit path; `Drop` covers cancellation by
/// aborting the event loop and spawning the process kill.
struct BrowserScope {
    browser: Option<Browser>,
    event_loop: Option<JoinHandle<()>>,
}

impl BrowserScope {
    async fn launch() -> Result<Self, ExtractError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .build()
            .map_err(ExtractError::SessionClosed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ExtractError::SessionClosed(format!("launch: {e}")))?;

        let event_loop = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            event_loop: Some(event_loop),
        })
    }

    fn browser(&self) -> &Browser {
        self.browser.as_ref().expect("BrowserScope: browser already released")
    }

    async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!(error = %e, "browser close failed, killing");
            }
            let _ = browser.wait().await;
        }
        if let Some(task) = self.event_loop.take() {
            task.abort();
        }
    }
}

impl Drop for BrowserScope {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop.take() {
            task.abort();
        }
        if let Some(mut browser) = self.browser.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = browser.kill().await;
                });
            }
        }
    }
}
