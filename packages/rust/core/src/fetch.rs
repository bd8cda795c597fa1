//! The URL conversion chain.
//!
//! Tiers, in order:
//! 1. Markdown for Agents: the origin serves `text/markdown` itself
//! 2. Local: the fetched HTML (or PDF) is converted in-process
//! 3. markdown.new: the external service converts the page
//!
//! `prefer_markdown_new` moves tier 3 to the front; a failure there still
//! falls through to the direct fetch.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE};
use tracing::{debug, info, instrument, warn};
use url::Url;

use doc2md_documents::convert_pdf;
use doc2md_markdown::{HtmlOptions, convert_html};
use doc2md_shared::{Doc2MdError, FetchConfig, Result, Tier};

use crate::guard::blocked_redirect;

/// Marker preceding the Markdown body in markdown.new responses.
const MARKDOWN_NEW_MARKER: &str = "Markdown Content:";

/// Markdown produced by one tier of the chain.
#[derive(Debug, Clone)]
pub struct UrlConversion {
    pub markdown: String,
    pub tier: Tier,
}

/// Run the chain for an already validated URL.
#[instrument(skip(client, config), fields(url = %url))]
pub(crate) async fn convert_url(
    client: &Client,
    config: &FetchConfig,
    url: &Url,
    timeout: Duration,
) -> Result<UrlConversion> {
    let mut preferred_error = None;

    if config.prefer_markdown_new {
        match fetch_markdown_new(client, &config.markdown_new_url, url, timeout).await {
            Ok(markdown) => {
                info!(tier = %Tier::MarkdownNew, "converted via preferred markdown.new");
                return Ok(UrlConversion {
                    markdown,
                    tier: Tier::MarkdownNew,
                });
            }
            Err(e) => {
                warn!(error = %e, "preferred markdown.new failed, trying direct fetch");
                preferred_error = Some(e);
            }
        }
    }

    let local_error = match fetch_direct(client, config, url, timeout).await {
        Ok(conversion) => {
            info!(tier = %conversion.tier, chars = conversion.markdown.len(), "converted");
            return Ok(conversion);
        }
        Err(e) => e,
    };

    // A redirect into an internal host ends the request.
    if !config.use_fallback || matches!(local_error, Doc2MdError::Blocked(_)) {
        return Err(local_error);
    }

    warn!(error = %local_error, "direct conversion failed, falling back to markdown.new");

    // markdown.new already failed for this request; don't ask it twice.
    let fallback = match preferred_error {
        Some(e) => Err(e),
        None => fetch_markdown_new(client, &config.markdown_new_url, url, timeout).await,
    };

    match fallback {
        Ok(markdown) => {
            info!(tier = %Tier::MarkdownNew, "converted via markdown.new fallback");
            Ok(UrlConversion {
                markdown,
                tier: Tier::MarkdownNew,
            })
        }
        Err(fallback_error) => Err(Doc2MdError::conversion(format!(
            "both local and fallback conversion failed: {local_error} / {fallback_error}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tiers 1 and 2: direct fetch
// ---------------------------------------------------------------------------

/// Fetch the page asking for Markdown, converting locally if the origin
/// answers with anything else.
async fn fetch_direct(
    client: &Client,
    config: &FetchConfig,
    url: &Url,
    timeout: Duration,
) -> Result<UrlConversion> {
    debug!("fetching origin");

    let response = client
        .get(url.as_str())
        .header(ACCEPT, "text/markdown, text/html")
        .header(ACCEPT_ENCODING, "identity")
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            blocked_redirect(&e).unwrap_or_else(|| Doc2MdError::Network(format!("{url}: {e}")))
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Doc2MdError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    debug!(%content_type, "origin responded");

    if content_type.contains("text/markdown") {
        let markdown = read_text(response, url).await?;
        return Ok(UrlConversion {
            markdown,
            tier: Tier::MarkdownForAgents,
        });
    }

    if content_type.contains("application/pdf") {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Doc2MdError::Network(format!("{url}: body read failed: {e}")))?;
        let markdown = tokio::task::spawn_blocking(move || convert_pdf(&bytes))
            .await
            .map_err(|e| Doc2MdError::conversion(format!("PDF worker failed: {e}")))??;
        return Ok(UrlConversion {
            markdown,
            tier: Tier::Local,
        });
    }

    let html = read_text(response, url).await?;
    let conversion = convert_html(&html, &HtmlOptions::with_base_url(url.as_str()))?;

    let chars = conversion.markdown.chars().count();
    if chars <= config.min_content_chars {
        return Err(Doc2MdError::conversion(format!(
            "conversion result too short ({chars} characters)"
        )));
    }

    Ok(UrlConversion {
        markdown: conversion.markdown,
        tier: Tier::Local,
    })
}

// ---------------------------------------------------------------------------
// Tier 3: markdown.new
// ---------------------------------------------------------------------------

/// Ask markdown.new to convert `url`.
async fn fetch_markdown_new(
    client: &Client,
    service_url: &str,
    url: &Url,
    timeout: Duration,
) -> Result<String> {
    let endpoint = format!("{}/{}", service_url.trim_end_matches('/'), url);
    debug!(%endpoint, "requesting markdown.new");

    let response = client
        .get(&endpoint)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Doc2MdError::Network(format!("{endpoint}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Doc2MdError::Http {
            url: endpoint,
            status: status.as_u16(),
        });
    }

    let body = read_text(response, url).await?;
    Ok(strip_markdown_new_header(&body))
}

/// Drop the metadata header markdown.new puts before the content.
fn strip_markdown_new_header(body: &str) -> String {
    match body.split_once(MARKDOWN_NEW_MARKER) {
        Some((_, content)) => content.trim().to_string(),
        None => body.to_string(),
    }
}

async fn read_text(response: reqwest::Response, url: &Url) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| Doc2MdError::Network(format!("{url}: body read failed: {e}")))
}
