//! Media fetcher: materializes harvested image URLs as local files.
//!
//! Downloads are sequential and individually fault-isolated: a network error
//! or non-image response is recorded as a per-URL failure and the batch
//! continues. Dedup is by content hash rather than URL, since the same image
//! may be served from different URLs. File names are deterministic
//! (`{postId}-{NN}{ext}`), so repeated runs against the same post overwrite
//! identical content instead of accumulating files.

use crate::models::{FetchFailure, FetchedMedia, MediaAsset};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Seam the orchestrator consumes; lets pipeline tests swap the network out.
pub trait MediaFetch {
    /// Download each URL into the fetcher's media directory. Total: per-URL
    /// problems land in the failure list, never abort the call.
    async fn fetch_all(&self, post_id: &str, urls: &[String]) -> FetchedMedia;
}

pub struct MediaFetcher {
    client: reqwest::Client,
    media_dir: PathBuf,
}

impl MediaFetcher {
    pub fn new(media_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            media_dir: media_dir.into(),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.starts_with("image/") {
                return Err(format!("not an image: content-type `{content_type}`"));
            }
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }
}

impl MediaFetch for MediaFetcher {
    #[instrument(level = "info", skip_all, fields(%post_id, urls = urls.len()))]
    async fn fetch_all(&self, post_id: &str, urls: &[String]) -> FetchedMedia {
        let mut fetched = FetchedMedia::default();

        if let Err(e) = fs::create_dir_all(&self.media_dir).await {
            warn!(dir = %self.media_dir.display(), error = %e, "media directory unavailable");
            fetched.failures = urls
                .iter()
                .map(|url| FetchFailure {
                    url: url.clone(),
                    reason: format!("media directory unavailable: {e}"),
                })
                .collect();
            return fetched;
        }

        let mut seen_hashes = HashSet::new();
        for (index, url) in urls.iter().enumerate() {
            let bytes = match self.download(url).await {
                Ok(bytes) => bytes,
                Err(reason) => {
                    warn!(%url, %reason, "media download failed");
                    fetched.failures.push(FetchFailure {
                        url: url.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let file_name = asset_file_name(post_id, index + 1, url);
            match store_asset(&self.media_dir, &file_name, url, &bytes, &mut seen_hashes).await {
                Ok(Some(asset)) => {
                    debug!(path = %asset.local_path.display(), bytes = bytes.len(), "stored media asset");
                    fetched.assets.push(asset);
                }
                Ok(None) => debug!(%url, "duplicate content, skipped"),
                Err(reason) => {
                    warn!(%url, %reason, "media write failed");
                    fetched.failures.push(FetchFailure {
                        url: url.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            succeeded = fetched.assets.len(),
            failed = fetched.failures.len(),
            "media fetch complete"
        );
        fetched
    }
}

/// Hex-encoded SHA-256 of the asset bytes.
fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write one asset unless its content hash was already stored this call.
async fn store_asset(
    dir: &Path,
    file_name: &str,
    source_url: &str,
    bytes: &[u8],
    seen_hashes: &mut HashSet<String>,
) -> Result<Option<MediaAsset>, String> {
    let hash = content_hash(bytes);
    if !seen_hashes.insert(hash.clone()) {
        return Ok(None);
    }

    let local_path = dir.join(file_name);
    fs::write(&local_path, bytes)
        .await
        .map_err(|e| e.to_string())?;

    Ok(Some(MediaAsset {
        source_url: source_url.to_string(),
        local_path,
        content_hash: hash,
    }))
}

/// Deterministic asset name: post id, 1-based URL sequence index, and the
/// URL path's extension (`.jpg` when the URL offers none).
fn asset_file_name(post_id: &str, sequence: usize, url: &str) -> String {
    format!("{post_id}-{sequence:02}{}", extension_for(url))
}

fn extension_for(url: &str) -> String {
    let ext = Url::parse(url).ok().and_then(|parsed| {
        let path = parsed.path().to_string();
        let file = path.rsplit('/').next().unwrap_or_default().to_string();
        let (_, ext) = file.rsplit_once('.')?;
        if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some(ext.to_ascii_lowercase())
        } else {
            None
        }
    });
    match ext {
        Some(ext) => format!(".{ext}"),
        None => ".jpg".to_string(),
    }
}
