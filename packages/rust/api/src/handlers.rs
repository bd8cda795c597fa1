//! HTTP request handlers for the conversion endpoints.

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use doc2md_core::Converter;
use doc2md_shared::{ConversionResponse, HtmlRequest, UrlRequest};

use crate::AppState;
use crate::error::ApiError;

const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Service description with the endpoint map.
pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "Doc2MD",
        "description": "Document to Markdown converter",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/convert/pdf": "POST - Convert PDF file",
            "/convert/docx": "POST - Convert Word document",
            "/convert/html": "POST - Convert HTML string",
            "/convert/url": "POST - Fetch URL and convert (GET ?url= returns plain Markdown)",
            "/https/{url}": "GET - Fetch https://{url} and return plain Markdown",
        }
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// URL
// ---------------------------------------------------------------------------

/// `POST /convert/url`
pub async fn convert_url(
    State(state): State<AppState>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<ConversionResponse>, ApiError> {
    let Json(request) = body?;
    let timeout = parse_timeout(request.timeout)?;
    let response = state
        .converter
        .convert_url_response(&request.url, timeout)
        .await?;

    info!(url = %request.url, chars = response.char_count, tier = ?response.tier, "url converted");
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    url: Option<String>,
    timeout: Option<f64>,
}

/// `GET /convert/url?url=...`, returning the Markdown body itself.
pub async fn convert_url_get(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Response, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("missing query parameter 'url'"))?;
    let timeout = parse_timeout(query.timeout)?;

    markdown_body(&state.converter, &url, timeout).await
}

/// `GET /https/{*rest}`
pub async fn https_prefix(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let url = prefixed_url("https", &rest, query.as_deref());
    markdown_body(&state.converter, &url, None).await
}

/// `GET /http/{*rest}`
pub async fn http_prefix(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let url = prefixed_url("http", &rest, query.as_deref());
    markdown_body(&state.converter, &url, None).await
}

/// Rebuild the target URL from a prefix route, keeping the query string.
fn prefixed_url(scheme: &str, rest: &str, query: Option<&str>) -> String {
    let rest = rest.trim_start_matches('/');
    match query {
        Some(q) if !q.is_empty() => format!("{scheme}://{rest}?{q}"),
        _ => format!("{scheme}://{rest}"),
    }
}

async fn markdown_body(
    converter: &Converter,
    url: &str,
    timeout: Option<Duration>,
) -> Result<Response, ApiError> {
    let conversion = converter.convert_url(url, timeout).await?;
    info!(%url, tier = %conversion.tier, "url converted");
    Ok(([(header::CONTENT_TYPE, MARKDOWN_CONTENT_TYPE)], conversion.markdown).into_response())
}

fn parse_timeout(secs: Option<f64>) -> Result<Option<Duration>, ApiError> {
    match secs {
        None => Ok(None),
        Some(s) if s.is_finite() && s > 0.0 => Ok(Some(Duration::from_secs_f64(s))),
        Some(s) => Err(ApiError::bad_request(format!(
            "timeout must be a positive number of seconds, got {s}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// `POST /convert/html`
pub async fn convert_html(
    State(state): State<AppState>,
    body: Result<Json<HtmlRequest>, JsonRejection>,
) -> Result<Json<ConversionResponse>, ApiError> {
    let Json(request) = body?;
    let response = state
        .converter
        .convert_html(&request.html, request.base_url.as_deref())?;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// File uploads
// ---------------------------------------------------------------------------

/// An uploaded `file` field.
struct Upload {
    filename: String,
    content: Vec<u8>,
}

/// Read the `file` field from a multipart body, ignoring other fields.
async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content = field.bytes().await?.to_vec();
        return Ok(Upload { filename, content });
    }
    Err(ApiError::bad_request("missing multipart field 'file'"))
}

fn has_extension(filename: &str, extensions: &[&str]) -> bool {
    let lower = filename.to_ascii_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext))
}

/// Run a CPU-bound document conversion off the async workers.
async fn convert_blocking(
    converter: &Converter,
    content: Vec<u8>,
    convert: fn(&Converter, &[u8]) -> doc2md_shared::Result<ConversionResponse>,
) -> Result<ConversionResponse, ApiError> {
    let converter = converter.clone();
    let response = tokio::task::spawn_blocking(move || convert(&converter, &content))
        .await
        .map_err(|e| ApiError::internal(format!("Conversion failed: worker panicked: {e}")))??;
    Ok(response)
}

/// `POST /convert/pdf`
pub async fn convert_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConversionResponse>, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    if !has_extension(&upload.filename, &[".pdf"]) {
        return Err(ApiError::bad_request("File must be a PDF"));
    }

    let response = convert_blocking(&state.converter, upload.content, Converter::convert_pdf).await?;
    info!(filename = %upload.filename, chars = response.char_count, "pdf converted");
    Ok(Json(response))
}

/// `POST /convert/docx`
pub async fn convert_docx(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConversionResponse>, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    if !has_extension(&upload.filename, &[".docx", ".doc"]) {
        return Err(ApiError::bad_request("File must be a Word document (.docx)"));
    }

    let response =
        convert_blocking(&state.converter, upload.content, Converter::convert_docx).await?;
    info!(filename = %upload.filename, chars = response.char_count, "docx converted");
    Ok(Json(response))
}
