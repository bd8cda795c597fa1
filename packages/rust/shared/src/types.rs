//! Request and response types shared by the REST and MCP surfaces.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SourceType / Tier
// ---------------------------------------------------------------------------

/// Kind of input a conversion started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Url,
    Pdf,
    Docx,
    Html,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Url => "url",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Html => "html",
        };
        f.write_str(s)
    }
}

/// Stage of the URL fallback chain that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// The origin served `text/markdown` directly.
    MarkdownForAgents,
    /// The fetched page was converted in-process.
    Local,
    /// The external markdown.new service converted the page.
    MarkdownNew,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MarkdownForAgents => "markdown_for_agents",
            Self::Local => "local",
            Self::MarkdownNew => "markdown_new",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /convert/url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRequest {
    pub url: String,
    /// Request timeout in seconds. Absent means `fetch.timeout_secs`
    /// from the config (30 by default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

/// Body of `POST /convert/html`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlRequest {
    pub html: String,
    /// Base URL for resolving relative links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// ConversionResponse
// ---------------------------------------------------------------------------

/// JSON response returned by every `POST /convert/*` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub markdown: String,
    pub source_type: SourceType,
    /// Length of `markdown` in characters.
    pub char_count: usize,
    /// First H1 of the output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Fallback tier that produced the result (URL conversions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

impl ConversionResponse {
    /// Build a response, deriving `char_count` from the Markdown.
    pub fn new(markdown: String, source_type: SourceType) -> Self {
        let char_count = markdown.chars().count();
        Self {
            markdown,
            source_type,
            char_count,
            title: None,
            tier: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }
}
