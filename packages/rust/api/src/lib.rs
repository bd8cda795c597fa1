//! REST API for Doc2MD.
//!
//! JSON endpoints return a [`ConversionResponse`](doc2md_shared::ConversionResponse);
//! the GET shortcuts return the Markdown itself. Errors are `{"detail": ...}`
//! with 400 for bad input and 500 for failed conversions.

mod error;
mod handlers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use doc2md_core::Converter;

pub use error::ApiError;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub converter: Converter,
    /// Request body limit for uploads, in bytes.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(converter: Converter, max_upload_bytes: usize) -> Self {
        Self {
            converter,
            max_upload_bytes,
        }
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route(
            "/convert/url",
            get(handlers::convert_url_get).post(handlers::convert_url),
        )
        .route("/convert/pdf", post(handlers::convert_pdf))
        .route("/convert/docx", post(handlers::convert_docx))
        .route("/convert/html", post(handlers::convert_html))
        .route("/https/{*rest}", get(handlers::https_prefix))
        .route("/http/{*rest}", get(handlers::http_prefix))
        .layer(upload_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Doc2MD API listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    use doc2md_shared::FetchConfig;
    use serde_json::Value;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ARTICLE: &str = r#"<html><body><main>
        <h1>Upload Limits</h1>
        <p>Every upload endpoint enforces the configured body limit before the
        document reaches a converter, so oversized files fail fast.</p>
    </main></body></html>"#;

    async fn spawn_app(fetch: FetchConfig) -> String {
        let state = AppState::new(Converter::new(fetch).unwrap(), 1024 * 1024);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn local_fetch(markdown_new: &MockServer) -> FetchConfig {
        FetchConfig {
            allow_private_hosts: true,
            markdown_new_url: markdown_new.uri(),
            ..FetchConfig::default()
        }
    }

    async fn html_origin() -> MockServer {
        let origin = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html"))
            .mount(&origin)
            .await;
        origin
    }

    fn docx_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(
                br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Minutes</w:t></w:r></w:p><w:p><w:r><w:t>Agreed.</w:t></w:r></w:p></w:body></w:document>"#,
            )
            .unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    fn upload(bytes: Vec<u8>, filename: &str) -> reqwest::multipart::Form {
        reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
        )
    }

    #[tokio::test]
    async fn health_and_index() {
        let base = spawn_app(FetchConfig::default()).await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let index: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
        assert_eq!(index["name"], "Doc2MD");
        assert!(index["endpoints"]["/convert/pdf"].is_string());
    }

    #[tokio::test]
    async fn post_html_returns_conversion_response() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/html"))
            .json(&serde_json::json!({
                "html": "<h1>Title</h1><p>See <a href=\"/x\">x</a></p>",
                "base_url": "https://example.com/a/"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["source_type"], "html");
        assert_eq!(body["title"], "Title");
        let markdown = body["markdown"].as_str().unwrap();
        assert!(markdown.contains("https://example.com/x"));
        assert_eq!(body["char_count"], markdown.chars().count());
    }

    #[tokio::test]
    async fn post_url_runs_the_chain() {
        let origin = html_origin().await;
        let fallback = MockServer::start().await;
        let base = spawn_app(local_fetch(&fallback)).await;

        let body: Value = reqwest::Client::new()
            .post(format!("{base}/convert/url"))
            .json(&serde_json::json!({ "url": format!("{}/post", origin.uri()) }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["source_type"], "url");
        assert_eq!(body["tier"], "local");
        assert!(body["markdown"].as_str().unwrap().starts_with("# Upload Limits"));
    }

    #[tokio::test]
    async fn get_url_returns_plain_markdown() {
        let origin = html_origin().await;
        let fallback = MockServer::start().await;
        let base = spawn_app(local_fetch(&fallback)).await;

        let resp = reqwest::Client::new()
            .get(format!("{base}/convert/url"))
            .query(&[("url", format!("{}/post", origin.uri()))])
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/markdown"));
        assert!(resp.text().await.unwrap().starts_with("# Upload Limits"));
    }

    #[tokio::test]
    async fn get_url_without_parameter_is_400() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::get(format!("{base}/convert/url")).await.unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("url"));
    }

    #[tokio::test]
    async fn prefix_route_rebuilds_the_url() {
        let origin = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path("/docs/page"))
            .and(wiremock::matchers::query_param("lang", "en"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("# Direct\n", "text/markdown"),
            )
            .expect(1)
            .mount(&origin)
            .await;
        let fallback = MockServer::start().await;
        let base = spawn_app(local_fetch(&fallback)).await;

        let host = origin.uri().trim_start_matches("http://").to_string();
        let resp = reqwest::get(format!("{base}/http/{host}/docs/page?lang=en"))
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "# Direct\n");
    }

    #[tokio::test]
    async fn https_prefix_route_uses_https_scheme() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::get(format!("{base}/https/127.0.0.1/admin?x=1"))
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("https://127.0.0.1/admin?x=1"), "{detail}");
    }

    #[tokio::test]
    async fn missing_json_field_is_400_with_detail() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/url"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        assert!(
            resp.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("application/json")
        );
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("url"), "{body}");
    }

    #[tokio::test]
    async fn malformed_json_is_400_with_detail() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/html"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].is_string(), "{body}");
    }

    #[tokio::test]
    async fn post_url_without_timeout_uses_configured_timeout() {
        let origin = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("# Slow", "text/markdown")
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&origin)
            .await;
        let base = spawn_app(FetchConfig {
            timeout_secs: 1,
            use_fallback: false,
            allow_private_hosts: true,
            ..FetchConfig::default()
        })
        .await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/url"))
            .json(&serde_json::json!({ "url": format!("{}/slow", origin.uri()) }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
    }

    #[tokio::test]
    async fn blocked_url_is_400() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/url"))
            .json(&serde_json::json!({ "url": "http://169.254.169.254/latest" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn failed_chain_is_500_with_detail() {
        let origin = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&origin)
            .await;
        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&fallback)
            .await;
        let base = spawn_app(local_fetch(&fallback)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/url"))
            .json(&serde_json::json!({ "url": format!("{}/missing", origin.uri()) }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.starts_with("Conversion failed:"), "{detail}");
    }

    #[tokio::test]
    async fn docx_upload_is_converted() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/docx"))
            .multipart(upload(docx_bytes(), "minutes.docx"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["source_type"], "docx");
        assert_eq!(body["markdown"], "# Minutes\n\nAgreed.");
        assert_eq!(body["title"], "Minutes");
    }

    #[tokio::test]
    async fn wrong_extension_is_400() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/pdf"))
            .multipart(upload(b"%PDF-1.4".to_vec(), "scan.png"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "File must be a PDF");
    }

    #[tokio::test]
    async fn missing_file_field_is_400() {
        let base = spawn_app(FetchConfig::default()).await;
        let form = reqwest::multipart::Form::new().text("note", "no file here");
        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/docx"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn corrupt_pdf_is_500() {
        let base = spawn_app(FetchConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/convert/pdf"))
            .multipart(upload(b"definitely not a pdf".to_vec(), "broken.pdf"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().starts_with("Conversion failed:"));
    }
}
