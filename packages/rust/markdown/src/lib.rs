//! HTML-to-Markdown conversion and cleanup passes.
//!
//! Converts raw HTML pages to clean Markdown using the `htmd` crate, after
//! dropping page chrome (navigation, headers, footers, sidebars, scripts) and
//! narrowing the document to its main content element. The same cleanup
//! passes are exported for the PDF and DOCX converters via [`post_process`].

mod cleanup;
mod table;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use doc2md_shared::{Doc2MdError, Result};

pub use cleanup::post_process;
pub use table::render_table;

/// Tags whose whole subtree is boilerplate and never reaches the output.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for the HTML-to-Markdown conversion.
#[derive(Debug, Clone, Default)]
pub struct HtmlOptions {
    /// Base URL used for resolving relative links.
    pub base_url: Option<String>,
}

impl HtmlOptions {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }
}

/// Result of converting an HTML document to Markdown.
#[derive(Debug, Clone)]
pub struct HtmlConversion {
    /// The final Markdown content.
    pub markdown: String,
    /// First H1 of the Markdown, if any.
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert an HTML document to clean Markdown.
///
/// 1. Selects the main content element and renders its tables as Markdown
/// 2. Converts HTML → Markdown via `htmd`, skipping boilerplate tags
/// 3. Runs the cleanup pipeline (links resolved against `base_url`)
#[instrument(skip(html, opts), fields(html_len = html.len()))]
pub fn convert_html(html: &str, opts: &HtmlOptions) -> Result<HtmlConversion> {
    let content = extract_content(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(BOILERPLATE_TAGS.to_vec())
        .build();

    let raw_markdown = converter
        .convert(&content.html)
        .map_err(|e| Doc2MdError::conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), tables = content.tables.len(), "htmd conversion complete");

    let raw_markdown = table::restore_tables(&raw_markdown, &content.tables);

    let base_url = opts.base_url.as_deref().and_then(|u| Url::parse(u).ok());
    let markdown = cleanup::run_pipeline(&raw_markdown, base_url.as_ref());
    let title = extract_title(&markdown);

    debug!(final_len = markdown.len(), title = ?title, "conversion complete");

    Ok(HtmlConversion { markdown, title })
}

/// Extract the title from the first H1 in Markdown text.
pub fn extract_title(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE
        .captures(md)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Content extraction
// ---------------------------------------------------------------------------

/// Main-content HTML with its tables swapped for placeholders.
struct ContentHtml {
    html: String,
    tables: Vec<String>,
}

/// Pick the main content element and pre-render its tables.
fn extract_content(html: &str) -> ContentHtml {
    let doc = Html::parse_document(html);

    let Some(root) = find_main_content(&doc) else {
        return ContentHtml {
            html: html.to_string(),
            tables: Vec::new(),
        };
    };

    // Table markup is taken from the same serializer as the content string,
    // so the replacement below matches byte for byte.
    let mut content = root.inner_html();
    let mut tables = Vec::new();

    let table_sel = Selector::parse("table").expect("valid selector");
    for table_el in root.select(&table_sel) {
        if has_ancestor(&table_el, &["table"]) {
            continue;
        }
        let rendered = table::html_table_to_markdown(&table_el);
        if rendered.is_empty() {
            continue;
        }
        let outer = table_el.html();
        if !content.contains(&outer) {
            continue;
        }
        let placeholder = table::placeholder(tables.len());
        content = content.replacen(&outer, &format!("<p>{placeholder}</p>"), 1);
        tables.push(rendered);
    }

    ContentHtml {
        html: content,
        tables,
    }
}

/// Locate the main content container in priority order.
fn find_main_content(doc: &Html) -> Option<ElementRef<'_>> {
    let selectors = ["main", "article", r#"[role="main"]"#];

    for sel_str in selectors {
        let selector = Selector::parse(sel_str).expect("valid selector");
        if let Some(el) = doc
            .select(&selector)
            .find(|el| !has_ancestor(el, BOILERPLATE_TAGS))
        {
            return Some(el);
        }
    }

    if let Some(el) = find_by_content_class(doc) {
        return Some(el);
    }

    let body_sel = Selector::parse("body").expect("valid selector");
    doc.select(&body_sel).next()
}

/// First non-boilerplate element with a content-like class name.
fn find_by_content_class(doc: &Html) -> Option<ElementRef<'_>> {
    static CLASS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"content|article|post|entry").expect("valid regex"));

    let class_sel = Selector::parse("[class]").expect("valid selector");
    doc.select(&class_sel).find(|el| {
        !BOILERPLATE_TAGS.contains(&el.value().name())
            && !has_ancestor(el, BOILERPLATE_TAGS)
            && el.value().classes().any(|c| CLASS_RE.is_match(c))
    })
}

/// Whether any ancestor element has one of the given tag names.
fn has_ancestor(el: &ElementRef<'_>, tags: &[&str]) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| tags.contains(&a.value().name()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(html: &str) -> HtmlConversion {
        convert_html(html, &HtmlOptions::default()).expect("conversion succeeds")
    }

    #[test]
    fn convert_simple_html() {
        let html = "<html><body><main><h1>Hello World</h1><p>Some text.</p></main></body></html>";
        let result = convert(html);

        assert!(result.markdown.starts_with("# Hello World"));
        assert!(result.markdown.contains("Some text."));
        assert_eq!(result.title.as_deref(), Some("Hello World"));
    }

    #[test]
    fn convert_strips_boilerplate() {
        let html = r#"<html><head><style>body { color: red; }</style></head><body>
            <header><p>Site banner</p></header>
            <nav><a href="/">Home</a></nav>
            <main><h1>Content</h1><p>Important text.</p>
                <aside>Related links</aside>
                <script>track();</script>
            </main>
            <footer><p>Copyright 2024</p></footer>
        </body></html>"#;

        let result = convert(html);
        assert!(result.markdown.contains("Important text."));
        assert!(!result.markdown.contains("Copyright 2024"));
        assert!(!result.markdown.contains("Site banner"));
        assert!(!result.markdown.contains("Related links"));
        assert!(!result.markdown.contains("track()"));
        assert!(!result.markdown.contains("color: red"));
    }

    #[test]
    fn convert_prefers_main_over_body() {
        let html = r#"<html><body>
            <div>Outside main</div>
            <main><p>Inside main</p></main>
        </body></html>"#;

        let result = convert(html);
        assert!(result.markdown.contains("Inside main"));
        assert!(!result.markdown.contains("Outside main"));
    }

    #[test]
    fn convert_uses_article_when_no_main() {
        let html = r#"<html><body>
            <div>Sidebar junk</div>
            <article><h1>Post</h1><p>Article body.</p></article>
        </body></html>"#;

        let result = convert(html);
        assert!(result.markdown.contains("Article body."));
        assert!(!result.markdown.contains("Sidebar junk"));
    }

    #[test]
    fn convert_finds_content_class() {
        let html = r#"<html><body>
            <div class="menu">Menu item</div>
            <div class="site-content"><h1>Blog</h1><p>Entry text.</p></div>
        </body></html>"#;

        let result = convert(html);
        assert!(result.markdown.contains("Entry text."));
        assert!(!result.markdown.contains("Menu item"));
    }

    #[test]
    fn content_class_inside_header_is_ignored() {
        let html = r#"<html><body>
            <header><div class="header-content">Logo</div></header>
            <div class="post"><p>Real post.</p></div>
        </body></html>"#;

        let result = convert(html);
        assert!(result.markdown.contains("Real post."));
        assert!(!result.markdown.contains("Logo"));
    }

    #[test]
    fn convert_falls_back_to_body() {
        let html = "<html><body><h1>Direct Body</h1><p>Content in body.</p></body></html>";
        let result = convert(html);
        assert!(result.markdown.contains("Direct Body"));
        assert!(result.markdown.contains("Content in body."));
    }

    #[test]
    fn convert_preserves_code_blocks() {
        let html = r#"<html><body><main>
            <h1>Code Example</h1>
            <pre><code class="language-rust">fn main() {
    println!("hello");
}</code></pre>
        </main></body></html>"#;

        let result = convert(html);
        assert!(result.markdown.contains("```rust"));
        assert!(result.markdown.contains("println!"));
    }

    #[test]
    fn convert_renders_tables() {
        let html = r#"<html><body><main>
            <h1>Data</h1>
            <table>
                <thead><tr><th>Name</th><th>Value</th></tr></thead>
                <tbody>
                    <tr><td>foo</td><td>a|b</td></tr>
                    <tr><td>baz</td><td>qux</td></tr>
                </tbody>
            </table>
            <p>After the table.</p>
        </main></body></html>"#;

        let result = convert(html);
        assert!(result.markdown.contains("| Name | Value |\n| --- | --- |"));
        assert!(result.markdown.contains("| foo | a\\|b |"));
        assert!(result.markdown.contains("| baz | qux |"));
        assert!(result.markdown.contains("After the table."));
    }

    #[test]
    fn convert_uses_dash_bullets() {
        let html = r#"<html><body><main>
            <ul><li>Item one</li><li>Item two</li></ul>
            <ol><li>First</li><li>Second</li></ol>
        </main></body></html>"#;

        let result = convert(html);
        assert!(result.markdown.contains("- Item one"));
        assert!(result.markdown.contains("- Item two"));
        assert!(result.markdown.contains("First"));
    }

    #[test]
    fn convert_resolves_relative_links() {
        let html = r#"<html><body><main>
            <p><a href="/docs/intro">Intro</a> and <a href="https://other.org/">Other</a></p>
        </main></body></html>"#;

        let result = convert_html(html, &HtmlOptions::with_base_url("https://example.com/blog/post"))
            .expect("conversion succeeds");
        assert!(result.markdown.contains("[Intro](https://example.com/docs/intro)"));
        assert!(result.markdown.contains("[Other](https://other.org/)"));
    }

    #[test]
    fn convert_no_html_tags_in_output() {
        let html = r#"<html><body><main>
            <h1>Clean Output</h1>
            <p>This should be <strong>clean</strong> markdown.</p>
            <div class="note"><p>A note.</p></div>
        </main></body></html>"#;

        let result = convert(html);
        assert!(!result.markdown.contains("<p>"));
        assert!(!result.markdown.contains("<div"));
        assert!(result.markdown.contains("**clean**"));
    }

    #[test]
    fn convert_empty_html() {
        let result = convert("<html><body></body></html>");
        assert!(result.markdown.is_empty());
        assert!(result.title.is_none());
    }

    #[test]
    fn output_has_no_triple_newlines_or_trailing_space() {
        let html = r#"<html><body><main>
            <p>One</p><br><br><br><div></div><div></div><p>Two</p>
        </main></body></html>"#;

        let result = convert(html);
        assert!(!result.markdown.contains("\n\n\n"));
        assert!(result.markdown.lines().all(|l| l == l.trim_end()));
        assert_eq!(result.markdown, result.markdown.trim());
    }

    #[test]
    fn extract_title_finds_first_h1() {
        assert_eq!(extract_title("intro\n# First\n# Second").as_deref(), Some("First"));
        assert_eq!(extract_title("## Only h2"), None);
    }
}
