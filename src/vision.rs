//! Vision-analysis collaborator.
//!
//! The pipeline consumes image description through the narrow
//! [`VisionAnalyzer`] seam; [`GeminiVision`] is the concrete client, posting
//! the fetched images inline (base64) to the `generateContent` endpoint. The
//! model is treated as a black box: one bounded timeout, no retry or backoff.

use crate::error::AnalysisError;
use crate::models::MediaAsset;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub trait VisionAnalyzer {
    /// Describe the given local image assets as free text.
    async fn describe(&self, assets: &[MediaAsset]) -> Result<String, AnalysisError>;
}

pub const DEFAULT_PROMPT: &str = "These images come from one social-media post. Describe their \
content in order, transcribing any visible text faithfully, and summarize what the post is \
communicating overall.";

pub struct GeminiVision {
    client: reqwest::Client,
    api_key: String,
    model: String,
    prompt: String,
}

impl GeminiVision {
    pub fn new(
        api_key: String,
        model: String,
        prompt: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            prompt,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Every text part across all candidates, joined in order.
fn response_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Mime type from the asset's file extension, matching what the fetcher
/// names files with. Unknown extensions fall back to JPEG.
fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

impl VisionAnalyzer for GeminiVision {
    #[instrument(level = "info", skip_all, fields(model = %self.model, images = assets.len()))]
    async fn describe(&self, assets: &[MediaAsset]) -> Result<String, AnalysisError> {
        if assets.is_empty() {
            return Err(AnalysisError("no images to analyze".to_string()));
        }

        let mut parts = vec![json!({ "text": self.prompt })];
        for asset in assets {
            let bytes = tokio::fs::read(&asset.local_path)
                .await
                .map_err(|e| AnalysisError(format!("read {}: {e}", asset.local_path.display())))?;
            debug!(path = %asset.local_path.display(), bytes = bytes.len(), "attaching image");
            parts.push(json!({
                "inline_data": {
                    "mime_type": mime_for_path(&asset.local_path),
                    "data": BASE64.encode(&bytes),
                }
            }));
        }

        let endpoint = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "contents": [{ "parts": parts }] }))
            .send()
            .await
            .map_err(|e| AnalysisError(format!("request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError(format!(
                "service returned {status}: {}",
                crate::utils::truncate_for_log(&body, 300)
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError(format!("decode: {e}")))?;

        let text = response_text(&parsed);
        if text.is_empty() {
            return Err(AnalysisError("service returned no text".to_string()));
        }
        info!(chars = text.len(), "analysis received");
        Ok(text)
    }
}
