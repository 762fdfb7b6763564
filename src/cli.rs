//! Command-line interface definitions for the VOOM clipper.
//!
//! All credentials can be provided via command-line flags or environment
//! variables, so the binary drops into a webhook handler's environment
//! without extra plumbing.

use clap::Parser;

/// Command-line arguments for one clipping run.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment
/// voom_clip https://voom.line.me/post/1172133110257348439
///
/// # Overriding the selector registry after a page redesign
/// voom_clip --selectors voom_selectors.yaml https://voom.line.me/post/...
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// LINE VOOM post URL to clip
    pub url: String,

    /// Directory the downloaded images are written to
    #[arg(short, long, default_value = "voom_images")]
    pub media_dir: String,

    /// Optional YAML file overriding the built-in selector registry
    #[arg(short, long)]
    pub selectors: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: String,

    /// Vision model identifier
    #[arg(long, env = "GEMINI_VISION_MODEL", default_value = "gemini-2.5-flash")]
    pub gemini_model: String,

    /// Prompt sent to the vision model ahead of the images
    #[arg(long)]
    pub prompt: Option<String>,

    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: String,

    /// Notion parent page (URL or id) new pages are created under
    #[arg(long, env = "NOTION_PARENT_PAGE")]
    pub notion_parent_page: String,

    /// Seconds to wait for navigation and for the post text container
    #[arg(long, default_value_t = 20)]
    pub nav_timeout_secs: u64,

    /// Seconds allowed per outbound HTTP request (downloads, analysis, persist)
    #[arg(long, default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Maximum concurrent browser sessions
    #[arg(long, default_value_t = 2)]
    pub max_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "voom_clip",
            "--gemini-api-key",
            "k1",
            "--notion-token",
            "k2",
            "--notion-parent-page",
            "0123456789abcdef0123456789abcdef",
            "https://voom.line.me/post/1",
        ]
    }

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::parse_from(base_args());
        assert_eq!(cli.url, "https://voom.line.me/post/1");
        assert_eq!(cli.media_dir, "voom_images");
        assert_eq!(cli.gemini_model, "gemini-2.5-flash");
        assert_eq!(cli.nav_timeout_secs, 20);
        assert_eq!(cli.max_sessions, 2);
        assert!(cli.selectors.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let mut args = base_args();
        args.splice(1..1, ["-m", "/tmp/media", "-s", "sel.yaml"]);
        let cli = Cli::parse_from(args);
        assert_eq!(cli.media_dir, "/tmp/media");
        assert_eq!(cli.selectors.as_deref(), Some("sel.yaml"));
    }
}
