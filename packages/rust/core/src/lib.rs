//! Conversion facade for Doc2MD.
//!
//! [`Converter`] owns the shared HTTP client and fetch settings, and is the
//! single entry point used by the REST API, the MCP server, and the CLI.
//! URL conversions run the tiered fallback chain in [`fetch`]; HTML, PDF, and
//! DOCX conversions delegate to the library crates.

pub mod fetch;
pub mod guard;

use std::time::Duration;

use reqwest::Client;
use tracing::instrument;

use doc2md_documents::DocumentKind;
use doc2md_markdown::{HtmlOptions, extract_title};
use doc2md_shared::{ConversionResponse, Doc2MdError, FetchConfig, Result, SourceType};

pub use fetch::UrlConversion;

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("Doc2MD/", env!("CARGO_PKG_VERSION"));

/// Converts URLs and documents to Markdown.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Converter {
    client: Client,
    config: FetchConfig,
}

impl Converter {
    /// Create a converter with the given fetch settings.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(guard::redirect_policy(config.allow_private_hosts))
            .timeout(config.timeout())
            .build()
            .map_err(|e| Doc2MdError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch a URL and convert it through the fallback chain.
    ///
    /// `timeout` overrides the configured per-request timeout.
    #[instrument(skip(self))]
    pub async fn convert_url(&self, url: &str, timeout: Option<Duration>) -> Result<UrlConversion> {
        let url = guard::check_url(url, self.config.allow_private_hosts)?;
        let timeout = timeout.unwrap_or_else(|| self.config.timeout());
        fetch::convert_url(&self.client, &self.config, &url, timeout).await
    }

    /// [`Converter::convert_url`] wrapped in a [`ConversionResponse`].
    pub async fn convert_url_response(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<ConversionResponse> {
        let UrlConversion { markdown, tier } = self.convert_url(url, timeout).await?;
        let title = extract_title(&markdown);
        Ok(ConversionResponse::new(markdown, SourceType::Url)
            .with_title(title)
            .with_tier(tier))
    }

    /// Convert an HTML string, resolving relative links against `base_url`.
    pub fn convert_html(&self, html: &str, base_url: Option<&str>) -> Result<ConversionResponse> {
        let opts = HtmlOptions {
            base_url: base_url.map(str::to_string),
        };
        let conversion = doc2md_markdown::convert_html(html, &opts)?;
        Ok(ConversionResponse::new(conversion.markdown, SourceType::Html).with_title(conversion.title))
    }

    pub fn convert_pdf(&self, content: &[u8]) -> Result<ConversionResponse> {
        let markdown = doc2md_documents::convert_pdf(content)?;
        Ok(document_response(markdown, SourceType::Pdf))
    }

    pub fn convert_docx(&self, content: &[u8]) -> Result<ConversionResponse> {
        let markdown = doc2md_documents::convert_docx(content)?;
        Ok(document_response(markdown, SourceType::Docx))
    }

    /// Convert a PDF or DOCX, detecting the format from the bytes.
    pub fn convert_document(
        &self,
        content: &[u8],
        filename: Option<&str>,
    ) -> Result<ConversionResponse> {
        let (kind, markdown) = doc2md_documents::convert_document(content, filename)?;
        let source_type = match kind {
            DocumentKind::Pdf => SourceType::Pdf,
            DocumentKind::Docx => SourceType::Docx,
        };
        Ok(document_response(markdown, source_type))
    }
}

fn document_response(markdown: String, source_type: SourceType) -> ConversionResponse {
    let title = extract_title(&markdown);
    ConversionResponse::new(markdown, source_type).with_title(title)
}
