//! PDF and DOCX to Markdown.
//!
//! Parsing is delegated to `lopdf` (PDF) and `zip` + `quick-xml` (DOCX);
//! this crate maps their output onto Markdown and runs the shared cleanup
//! from `doc2md-markdown`.

mod docx;
mod pdf;

use std::io::Cursor;

use doc2md_shared::{Doc2MdError, Result};

pub use docx::convert_docx;
pub use pdf::convert_pdf;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Binary document formats accepted by [`convert_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Detect the format from magic bytes, falling back to the filename.
    pub fn detect(content: &[u8], filename: Option<&str>) -> Result<Self> {
        let extension = filename
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        if content.starts_with(PDF_MAGIC) {
            return Ok(Self::Pdf);
        }
        if content.starts_with(ZIP_MAGIC)
            && (matches!(extension.as_deref(), Some("docx")) || has_word_document(content))
        {
            return Ok(Self::Docx);
        }

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("docx" | "doc") => Ok(Self::Docx),
            _ => Err(Doc2MdError::validation(
                "unsupported document: expected a PDF or DOCX file",
            )),
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => f.write_str("pdf"),
            Self::Docx => f.write_str("docx"),
        }
    }
}

fn has_word_document(content: &[u8]) -> bool {
    zip::ZipArchive::new(Cursor::new(content))
        .map(|archive| archive.index_for_name("word/document.xml").is_some())
        .unwrap_or(false)
}

/// Detect the format of `content` and convert it.
pub fn convert_document(content: &[u8], filename: Option<&str>) -> Result<(DocumentKind, String)> {
    let kind = DocumentKind::detect(content, filename)?;
    tracing::debug!(%kind, bytes = content.len(), "document format detected");

    let markdown = match kind {
        DocumentKind::Pdf => convert_pdf(content)?,
        DocumentKind::Docx => convert_docx(content)?,
    };
    Ok((kind, markdown))
}
