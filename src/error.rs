//! Typed failure taxonomy for the clipping pipeline.
//!
//! Every failure a pipeline run can end in is one variant of [`PipelineError`].
//! Component-level errors ([`ExtractError`], [`PersistError`], [`AnalysisError`])
//! convert into it at the orchestrator boundary, so callers only ever see one
//! discriminated value and can map each kind to a distinct user-facing message.

use thiserror::Error;

/// Failures raised by the browser extraction session.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A registry selector never became attached within the bounded wait.
    /// Carries the semantic role name, not the raw expression, so the
    /// remediation target is obvious from the message alone.
    #[error("selector for `{selector}` never matched the page")]
    SelectorMiss { selector: String },

    /// Navigation resolved to a login/consent surface instead of post content.
    #[error("post is behind a login wall")]
    AuthRequired,

    /// The browser session or page terminated abruptly mid-extraction.
    #[error("browser session closed: {0}")]
    SessionClosed(String),
}

/// Failure from the vision-analysis collaborator.
#[derive(Debug, Error)]
#[error("vision analysis failed: {0}")]
pub struct AnalysisError(pub String);

/// Remediation class for a document-store write failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistKind {
    /// Token or page-sharing problem; fixing the integration is on the user.
    Auth,
    /// The store rejected the payload itself.
    Malformed,
    /// Transport failures, rate limits, 5xx responses.
    Unknown,
}

impl std::fmt::Display for PersistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PersistKind::Auth => "auth",
            PersistKind::Malformed => "malformed",
            PersistKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Failure from the document-store collaborator.
#[derive(Debug, Error)]
#[error("document write failed ({kind}): {message}")]
pub struct PersistError {
    pub kind: PersistKind,
    pub message: String,
}

/// The one discriminated failure value a pipeline run can return.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input URL is outside the supported VOOM host patterns.
    #[error("unsupported post URL: {0}")]
    InvalidReference(String),

    #[error("selector for `{selector}` never matched the page")]
    SelectorMiss { selector: String },

    #[error("post is behind a login wall")]
    AuthRequired,

    #[error("browser session closed: {0}")]
    SessionClosed(String),

    /// Nothing downloadable survived extraction and fetching.
    #[error("post yielded no media and no text")]
    NoMedia,

    #[error("vision analysis failed: {0}")]
    AnalysisService(String),

    #[error("document write failed ({kind}): {message}")]
    Persist { kind: PersistKind, message: String },

    /// Reserved. The block converter is pure and total over its input
    /// domain; this variant documents the contract rather than an expected
    /// occurrence.
    #[error("block conversion failed: {0}")]
    Conversion(String),
}

impl From<ExtractError> for PipelineError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::SelectorMiss { selector } => PipelineError::SelectorMiss { selector },
            ExtractError::AuthRequired => PipelineError::AuthRequired,
            ExtractError::SessionClosed(msg) => PipelineError::SessionClosed(msg),
        }
    }
}

impl From<PersistError> for PipelineError {
    fn from(err: PersistError) -> Self {
        PipelineError::Persist {
            kind: err.kind,
            message: err.message,
        }
    }
}

impl From<AnalysisError> for PipelineError {
    fn from(err: AnalysisError) -> Self {
        PipelineError::AnalysisService(err.0)
    }
}

impl PipelineError {
    /// Human-readable message for the requester. Each kind gets its own
    /// wording because the remediation differs per kind.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidReference(_) => {
                "That does not look like a LINE VOOM post URL. Expected \
                 https://voom.line.me/post/... or https://linevoom.line.me/post/..."
                    .to_string()
            }
            PipelineError::SelectorMiss { selector } => format!(
                "The VOOM page structure appears to have changed (`{selector}` was \
                 never found). The selector registry needs updating."
            ),
            PipelineError::AuthRequired => {
                "This post sits behind a LINE login wall and cannot be clipped.".to_string()
            }
            PipelineError::SessionClosed(_) => {
                "The browser session died while reading the post. Try again.".to_string()
            }
            PipelineError::NoMedia => {
                "The post yielded no downloadable images and no text.".to_string()
            }
            PipelineError::AnalysisService(_) => {
                "The vision analysis service rejected the request.".to_string()
            }
            PipelineError::Persist { kind, .. } => match kind {
                PersistKind::Auth => {
                    "Notion refused the write. Check the integration token and that the \
                     parent page is shared with it."
                        .to_string()
                }
                PersistKind::Malformed => "Notion rejected the page payload.".to_string(),
                PersistKind::Unknown => "The Notion write failed. Try again later.".to_string(),
            },
            PipelineError::Conversion(_) => {
                "The post text could not be converted into blocks.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_converts_with_selector_name() {
        let err: PipelineError = ExtractError::SelectorMiss {
            selector: "PostTextContainer".to_string(),
        }
        .into();
        match err {
            PipelineError::SelectorMiss { selector } => assert_eq!(selector, "PostTextContainer"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_persist_kinds_render_distinct_messages() {
        let auth = PipelineError::Persist {
            kind: PersistKind::Auth,
            message: "401".to_string(),
        };
        let malformed = PipelineError::Persist {
            kind: PersistKind::Malformed,
            message: "400".to_string(),
        };
        assert_ne!(auth.user_message(), malformed.user_message());
    }

    #[test]
    fn test_auth_and_selector_messages_differ() {
        let auth = PipelineError::AuthRequired;
        let miss = PipelineError::SelectorMiss {
            selector: "PostTextContainer".to_string(),
        };
        assert_ne!(auth.user_message(), miss.user_message());
    }
}
