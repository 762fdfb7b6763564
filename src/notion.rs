//! Document-store collaborator.
//!
//! [`NotionStore`] turns a [`PageDraft`] into one Notion page: a header
//! paragraph linking the source post, the post body as blocks, and (when
//! present) the vision analysis under its own heading, converted through the
//! same block grammar as the body.
//!
//! Notion caps children at 100 per create and rich-text items at 2000
//! characters, so children beyond the first 100 are appended in batches of
//! 50 and long runs are chunked below the cap. Writes are never retried:
//! re-posting a create risks duplicate pages. Failures classify by
//! remediation: 401/403 are an auth problem, 400/422 a payload problem,
//! everything else unknown.

use crate::blocks::{self, BlockNode, TextRun};
use crate::error::{PersistError, PersistKind};
use crate::models::PageDraft;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, instrument};

pub trait DocumentStore {
    /// Create one page and return its reference URL.
    async fn create_page(&self, draft: &PageDraft) -> Result<String, PersistError>;
}

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
/// Children accepted by the page-create call.
const CREATE_CHILD_LIMIT: usize = 100;
/// Children per follow-up append call.
const APPEND_BATCH_SIZE: usize = 50;
/// Per-rich-text-item character cap, kept under Notion's 2000 limit.
const RICH_TEXT_LIMIT: usize = 1800;

static PAGE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{32}").unwrap());

/// Pull a page id out of a Notion URL or raw id and format it dashed.
pub fn extract_page_id(value: &str) -> Option<String> {
    let raw = PAGE_ID_RE.find(value)?.as_str().to_ascii_lowercase();
    Some(format!(
        "{}-{}-{}-{}-{}",
        &raw[0..8],
        &raw[8..12],
        &raw[12..16],
        &raw[16..20],
        &raw[20..32]
    ))
}

pub struct NotionStore {
    client: reqwest::Client,
    token: String,
    parent_page_id: String,
}

impl NotionStore {
    /// `parent` may be a full Notion page URL or a bare id.
    pub fn new(token: String, parent: &str, timeout: Duration) -> Result<Self, PersistError> {
        let parent_page_id = extract_page_id(parent).ok_or_else(|| PersistError {
            kind: PersistKind::Malformed,
            message: format!("no page id found in parent reference `{parent}`"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersistError {
                kind: PersistKind::Unknown,
                message: format!("client build: {e}"),
            })?;
        Ok(Self {
            client,
            token,
            parent_page_id,
        })
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<reqwest::Response, PersistError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| PersistError {
                kind: PersistKind::Unknown,
                message: format!("request: {e}"),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }
}

fn classify_status(status: u16, body: &str) -> PersistError {
    let kind = match status {
        401 | 403 => PersistKind::Auth,
        400 | 422 => PersistKind::Malformed,
        _ => PersistKind::Unknown,
    };
    PersistError {
        kind,
        message: format!("notion api {status}: {}", truncate_for_log(body, 300)),
    }
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
    url: Option<String>,
}

impl DocumentStore for NotionStore {
    #[instrument(level = "info", skip_all, fields(title = %draft.title))]
    async fn create_page(&self, draft: &PageDraft) -> Result<String, PersistError> {
        let children = draft_children(draft);
        let first = children.len().min(CREATE_CHILD_LIMIT);

        let payload = json!({
            "parent": { "page_id": self.parent_page_id },
            "properties": {
                "title": { "title": [ { "type": "text", "text": { "content": draft.title } } ] }
            },
            "children": &children[..first],
        });

        let response = self.post(&format!("{NOTION_API}/pages"), &payload).await?;
        let page: CreatedPage = response.json().await.map_err(|e| PersistError {
            kind: PersistKind::Unknown,
            message: format!("decode create response: {e}"),
        })?;

        for batch in children[first..].chunks(APPEND_BATCH_SIZE) {
            debug!(batch = batch.len(), "appending overflow children");
            self.post(
                &format!("{NOTION_API}/blocks/{}/children", page.id),
                &json!({ "children": batch }),
            )
            .await?;
        }

        let page_url = page
            .url
            .unwrap_or_else(|| format!("https://www.notion.so/{}", page.id.replace('-', "")));
        info!(children = children.len(), %page_url, "page created");
        Ok(page_url)
    }
}

/// Header (source link + spacer), body blocks, then the analysis section.
fn draft_children(draft: &PageDraft) -> Vec<Value> {
    let mut children = vec![
        json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": { "rich_text": [
                { "type": "text", "text": { "content": "VOOM source: " } },
                { "type": "text", "text": { "content": draft.source_url, "link": { "url": draft.source_url } } },
            ] }
        }),
        json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": { "rich_text": [] }
        }),
    ];

    children.extend(draft.body.iter().map(block_json));

    if let Some(analysis) = &draft.analysis {
        children.push(block_json(&BlockNode::Heading {
            level: 2,
            text: "Image analysis".to_string(),
        }));
        children.extend(blocks::to_blocks(analysis).iter().map(block_json));
    }

    children
}

fn block_json(block: &BlockNode) -> Value {
    match block {
        BlockNode::Heading { level, text } => {
            let kind = format!("heading_{level}");
            let mut value = json!({ "object": "block", "type": kind });
            value[kind.as_str()] = json!({ "rich_text": plain_rich_text(text) });
            value
        }
        BlockNode::ListItem { ordered, text } => {
            let kind = if *ordered {
                "numbered_list_item"
            } else {
                "bulleted_list_item"
            };
            let mut value = json!({ "object": "block", "type": kind });
            value[kind] = json!({ "rich_text": plain_rich_text(text) });
            value
        }
        BlockNode::Paragraph { runs } => json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": { "rich_text": rich_text_json(runs) }
        }),
    }
}

fn plain_rich_text(text: &str) -> Vec<Value> {
    rich_text_json(&[TextRun {
        text: text.to_string(),
        bold: false,
    }])
}

/// Runs as Notion rich-text items, long texts split below the length cap.
fn rich_text_json(runs: &[TextRun]) -> Vec<Value> {
    let mut items = Vec::new();
    for run in runs {
        for chunk in char_chunks(&run.text, RICH_TEXT_LIMIT) {
            if run.bold {
                items.push(json!({
                    "type": "text",
                    "text": { "content": chunk },
                    "annotations": { "bold": true }
                }));
            } else {
                items.push(json!({ "type": "text", "text": { "content": chunk } }));
            }
        }
    }
    items
}

/// Split on character (not byte) boundaries into pieces of at most `limit`.
fn char_chunks(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        if count == limit {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_page_id_from_url_and_raw() {
        let dashed = extract_page_id(
            "https://www.notion.so/team/Morning-0123456789abcdef0123456789ABCDEF",
        )
        .unwrap();
        assert_eq!(dashed, "01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(
            extract_page_id("0123456789abcdef0123456789abcdef").unwrap(),
            "01234567-89ab-cdef-0123-456789abcdef"
        );
    }

    #[test]
    fn test_extract_page_id_rejects_short_values() {
        assert!(extract_page_id("https://www.notion.so/team/short-123").is_none());
        assert!(extract_page_id("").is_none());
    }

    #[test]
    fn test_block_json_shapes() {
        let heading = block_json(&BlockNode::Heading {
            level: 2,
            text: "T".to_string(),
        });
        assert_eq!(heading["type"], "heading_2");
        assert_eq!(heading["heading_2"]["rich_text"][0]["text"]["content"], "T");

        let item = block_json(&BlockNode::ListItem {
            ordered: true,
            text: "x".to_string(),
        });
        assert_eq!(item["type"], "numbered_list_item");

        let para = block_json(&BlockNode::Paragraph {
            runs: vec![
                TextRun {
                    text: "a ".to_string(),
                    bold: false,
                },
                TextRun {
                    text: "b".to_string(),
                    bold: true,
                },
            ],
        });
        let rich = &para["paragraph"]["rich_text"];
        assert_eq!(rich[0]["text"]["content"], "a ");
        assert_eq!(rich[1]["annotations"]["bold"], true);
    }

    #[test]
    fn test_char_chunks_respects_boundaries() {
        assert_eq!(char_chunks("abcd", 2), vec!["ab", "cd"]);
        assert_eq!(char_chunks("abcde", 2), vec!["ab", "cd", "e"]);
        // Multi-byte characters split on char boundaries, not bytes.
        assert_eq!(char_chunks("あいう", 2), vec!["あい", "う"]);
        assert!(char_chunks("", 2).is_empty());
    }

    #[test]
    fn test_draft_children_layout() {
        let draft = PageDraft {
            title: "t".to_string(),
            source_url: "https://voom.line.me/post/1".to_string(),
            body: vec![BlockNode::Paragraph {
                runs: vec![TextRun {
                    text: "body".to_string(),
                    bold: false,
                }],
            }],
            analysis: Some("# Findings\ndetail".to_string()),
        };
        let children = draft_children(&draft);

        // header link + spacer + 1 body + analysis heading + 2 analysis blocks
        assert_eq!(children.len(), 6);
        assert_eq!(
            children[0]["paragraph"]["rich_text"][1]["text"]["link"]["url"],
            "https://voom.line.me/post/1"
        );
        assert_eq!(children[3]["type"], "heading_2");
        assert_eq!(children[4]["type"], "heading_1");
    }

    #[test]
    fn test_draft_children_without_analysis() {
        let draft = PageDraft {
            title: "t".to_string(),
            source_url: "https://voom.line.me/post/1".to_string(),
            body: vec![],
            analysis: None,
        };
        assert_eq!(draft_children(&draft).len(), 2);
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(401, "").kind, PersistKind::Auth);
        assert_eq!(classify_status(403, "").kind, PersistKind::Auth);
        assert_eq!(classify_status(400, "").kind, PersistKind::Malformed);
        assert_eq!(classify_status(429, "").kind, PersistKind::Unknown);
        assert_eq!(classify_status(503, "").kind, PersistKind::Unknown);
    }
}
