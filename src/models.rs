//! Data models for VOOM posts and their extracted representations.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`PostReference`]: a validated pointer to one VOOM post
//! - [`ExtractedContent`]: the text body and image URLs harvested from a page
//! - [`MediaAsset`]: one image materialized on the local filesystem
//! - [`FetchedMedia`] / [`FetchFailure`]: the media fetcher's partial-success report
//! - [`PageDraft`]: everything the document store needs to create a page
//!
//! Extraction results are typed, validated records constructed only after
//! explicit presence checks; raw page-query results never travel downstream.

use crate::error::PipelineError;
use url::Url;

/// Host patterns a post URL must belong to. Any path suffix is acceptable.
const VOOM_HOSTS: [&str; 2] = ["voom.line.me", "linevoom.line.me"];

/// A validated reference to one VOOM post.
///
/// Created from user input; the only place `InvalidReference` is raised.
/// `post_id` is derived from the last path segment and sanitized so it is
/// safe to embed in file names and page titles.
#[derive(Debug, Clone)]
pub struct PostReference {
    /// The full, parsed post URL.
    pub url: Url,
    /// Filesystem-safe identifier derived from the URL path.
    pub post_id: String,
}

impl PostReference {
    /// Validate a raw URL string as belonging to the supported URL family.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidReference`] for unparsable URLs,
    /// non-http(s) schemes, and hosts outside the two known VOOM patterns.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| PipelineError::InvalidReference(format!("{raw}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::InvalidReference(format!(
                "{raw}: scheme `{}` is not http(s)",
                url.scheme()
            )));
        }

        let host = url.host_str().unwrap_or_default();
        if !VOOM_HOSTS.contains(&host) {
            return Err(PipelineError::InvalidReference(format!(
                "{raw}: host `{host}` is not a VOOM host"
            )));
        }

        let post_id = derive_post_id(&url);
        Ok(Self { url, post_id })
    }
}

/// Last non-empty path segment, reduced to filename-safe characters.
fn derive_post_id(url: &Url) -> String {
    let segment = url
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or_default();

    let id: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if id.is_empty() { "post".to_string() } else { id }
}

/// The text body and image URLs harvested from one post page.
///
/// Produced once per successful extraction session. Not unique: re-extraction
/// may yield a different set if the page changed between calls. The session
/// guarantees `image_urls` is duplicate-free with first-seen order preserved,
/// and that at least one of the two fields is non-empty.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub text_body: String,
    pub image_urls: Vec<String>,
}

impl ExtractedContent {
    pub fn is_empty(&self) -> bool {
        self.text_body.is_empty() && self.image_urls.is_empty()
    }
}

/// One image downloaded to local storage.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    /// The URL the bytes came from.
    pub source_url: String,
    /// Where the bytes were written.
    pub local_path: std::path::PathBuf,
    /// SHA-256 of the bytes, hex encoded. No two assets in one fetch share a hash.
    pub content_hash: String,
}

/// One URL the media fetcher could not materialize.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub url: String,
    pub reason: String,
}

/// Partial-success report from the media fetcher. Per-asset failures never
/// abort the batch; the orchestrator decides whether the result is enough.
#[derive(Debug, Clone, Default)]
pub struct FetchedMedia {
    pub assets: Vec<MediaAsset>,
    pub failures: Vec<FetchFailure>,
}

/// Everything the document store needs to create one page.
#[derive(Debug, Clone)]
pub struct PageDraft {
    /// Page title; embeds the extraction timestamp.
    pub title: String,
    /// The original post URL, linked from the page header.
    pub source_url: String,
    /// The post body as structured blocks.
    pub body: Vec<crate::blocks::BlockNode>,
    /// Vision analysis text, absent when analysis was skipped or failed.
    pub analysis: Option<String>,
}
