//! MCP tool definitions and dispatch.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::{info, warn};

use doc2md_core::Converter;
use doc2md_shared::{ConversionResponse, Result};

use crate::protocol::ToolOutput;

pub const CONVERT_URL: &str = "convert_url_to_markdown";
pub const CONVERT_HTML: &str = "convert_html_to_markdown";
pub const CONVERT_PDF: &str = "convert_pdf_to_markdown";
pub const CONVERT_DOCX: &str = "convert_docx_to_markdown";
pub const CONVERT_DOCUMENT: &str = "convert_document_to_markdown";

/// Appended to URL output cut at the character limit.
pub const TRUNCATION_MARKER: &str = "\n\n...[content truncated]...";

/// List all available tools with their schemas.
pub fn list_tools() -> Vec<Value> {
    vec![
        json!({
            "name": CONVERT_URL,
            "description": "Fetch a web page and convert it to Markdown. Prefers Markdown served by the site itself (Markdown for Agents), then converts the HTML locally, then falls back to markdown.new.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "http(s) URL of the page to convert" }
                },
                "required": ["url"]
            }
        }),
        json!({
            "name": CONVERT_HTML,
            "description": "Convert HTML to Markdown. Scripts, styles, navigation and other page chrome are removed.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "html": { "type": "string", "description": "HTML content to convert" },
                    "base_url": { "type": "string", "description": "Base URL for resolving relative links" }
                },
                "required": ["html"]
            }
        }),
        json!({
            "name": CONVERT_PDF,
            "description": "Convert a PDF file to Markdown. Input is the base64-encoded PDF.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pdf_base64": { "type": "string", "description": "Base64-encoded PDF file content" }
                },
                "required": ["pdf_base64"]
            }
        }),
        json!({
            "name": CONVERT_DOCX,
            "description": "Convert a Word document to Markdown. Input is the base64-encoded DOCX.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "docx_base64": { "type": "string", "description": "Base64-encoded DOCX file content" }
                },
                "required": ["docx_base64"]
            }
        }),
        json!({
            "name": CONVERT_DOCUMENT,
            "description": "Convert a PDF or Word document to Markdown, detecting the format from its content.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "document_base64": { "type": "string", "description": "Base64-encoded file content" },
                    "filename": { "type": "string", "description": "Original file name, used when the content is ambiguous" }
                },
                "required": ["document_base64"]
            }
        }),
    ]
}

/// Run a tool. Failures come back as error outputs, never as protocol errors.
pub async fn call_tool(
    converter: &Converter,
    max_output_chars: usize,
    name: &str,
    arguments: &Value,
) -> ToolOutput {
    info!(tool = name, "calling tool");

    let output = match name {
        CONVERT_URL => convert_url(converter, max_output_chars, arguments).await,
        CONVERT_HTML => convert_html(converter, arguments),
        CONVERT_PDF => {
            with_document(arguments, "pdf_base64", "PDF", |bytes| converter.convert_pdf(bytes))
        }
        CONVERT_DOCX => {
            with_document(arguments, "docx_base64", "DOCX", |bytes| converter.convert_docx(bytes))
        }
        CONVERT_DOCUMENT => {
            let filename = string_arg(arguments, "filename");
            with_document(arguments, "document_base64", "document", |bytes| {
                converter.convert_document(bytes, filename)
            })
        }
        other => ToolOutput::error(format!("Unknown tool: {other}")),
    };

    if output.is_error {
        warn!(tool = name, error = %output.text, "tool failed");
    }
    output
}

async fn convert_url(converter: &Converter, max_output_chars: usize, arguments: &Value) -> ToolOutput {
    let Some(url) = string_arg(arguments, "url") else {
        return ToolOutput::error("Error: a URL is required");
    };

    match converter.convert_url(url, None).await {
        Ok(conversion) => ToolOutput::text(truncate(conversion.markdown, max_output_chars)),
        Err(e) => conversion_failed(&e),
    }
}

fn convert_html(converter: &Converter, arguments: &Value) -> ToolOutput {
    let Some(html) = string_arg(arguments, "html") else {
        return ToolOutput::error("Error: HTML content is required");
    };
    let base_url = string_arg(arguments, "base_url");

    finish(converter.convert_html(html, base_url))
}

/// Decode a base64 argument and hand the bytes to `convert`.
fn with_document(
    arguments: &Value,
    key: &str,
    label: &str,
    convert: impl FnOnce(&[u8]) -> Result<ConversionResponse>,
) -> ToolOutput {
    let Some(encoded) = string_arg(arguments, key) else {
        return ToolOutput::error(format!("Error: base64-encoded {label} is required"));
    };
    let Some(bytes) = decode_base64(encoded) else {
        return ToolOutput::error("Error: invalid base64 encoding");
    };

    finish(convert(&bytes))
}

fn finish(result: Result<ConversionResponse>) -> ToolOutput {
    match result {
        Ok(response) => ToolOutput::text(response.markdown),
        Err(e) => conversion_failed(&e),
    }
}

fn conversion_failed(err: &doc2md_shared::Doc2MdError) -> ToolOutput {
    ToolOutput::error(format!("Conversion failed: {err}"))
}

/// A non-empty string argument.
fn string_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Standard base64, tolerating line breaks and other embedded whitespace.
fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).ok()
}

/// Cut `markdown` to `max_chars` characters, marking the cut.
fn truncate(markdown: String, max_chars: usize) -> String {
    match markdown.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut cut = markdown;
            cut.truncate(byte_idx);
            cut.push_str(TRUNCATION_MARKER);
            cut
        }
        None => markdown,
    }
}
