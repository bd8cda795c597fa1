//! PDF text extraction.
//!
//! Page text comes from `lopdf`; this module only cleans it up and stitches
//! pages together with `*Page N*` separators.

use std::sync::LazyLock;

use lopdf::Document;
use regex::Regex;
use tracing::{debug, instrument, warn};

use doc2md_markdown::post_process;
use doc2md_shared::{Doc2MdError, Result};

/// Convert PDF bytes to Markdown, one section per non-empty page.
#[instrument(skip(content), fields(bytes = content.len()))]
pub fn convert_pdf(content: &[u8]) -> Result<String> {
    let doc = Document::load_mem(content)
        .map_err(|e| Doc2MdError::parse(format!("invalid PDF: {e}")))?;

    let pages = doc.get_pages();
    let mut parts: Vec<String> = Vec::with_capacity(pages.len());

    for &page_num in pages.keys() {
        let text = match doc.extract_text(&[page_num]) {
            Ok(text) => clean_text(&text),
            Err(e) => {
                warn!(page = page_num, error = %e, "text extraction failed, skipping page");
                continue;
            }
        };

        if text.is_empty() {
            continue;
        }

        if !parts.is_empty() {
            parts.push(format!("---\n*Page {page_num}*"));
        }
        parts.push(text);
    }

    debug!(pages = pages.len(), sections = parts.len(), "PDF text extracted");

    Ok(post_process(&parts.join("\n\n")))
}

/// Collapse horizontal whitespace runs and excess blank lines.
fn clean_text(text: &str) -> String {
    static SPACES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
    static NEWLINES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let text = SPACES_RE.replace_all(text, " ");
    let text = NEWLINES_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Build a PDF with one Courier text line per page.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn single_page_has_no_separator() {
        let md = convert_pdf(&build_pdf(&["Hello from page one"])).unwrap();
        assert!(md.contains("Hello from page one"));
        assert!(!md.contains("*Page"));
    }

    #[test]
    fn later_pages_get_separators() {
        let md = convert_pdf(&build_pdf(&["Alpha text", "Beta text"])).unwrap();
        let alpha = md.find("Alpha text").unwrap();
        let marker = md.find("---\n*Page 2*").unwrap();
        let beta = md.find("Beta text").unwrap();
        assert!(alpha < marker && marker < beta);
    }

    #[test]
    fn blank_pages_are_skipped() {
        let md = convert_pdf(&build_pdf(&["First", "", "Third"])).unwrap();
        assert!(!md.contains("*Page 2*"));
        assert!(md.contains("*Page 3*"));
    }

    #[test]
    fn malformed_pdf_is_a_parse_error() {
        let err = convert_pdf(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, Doc2MdError::Parse { .. }));
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a \t  b\n\n\n\nc  "), "a b\n\nc");
    }
}
