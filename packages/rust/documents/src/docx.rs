//! DOCX (Word) to Markdown.
//!
//! DOCX files are ZIP archives; the parts read here are:
//! - `word/document.xml`: paragraphs, runs, and tables
//! - `word/styles.xml`: style id → display name (`Heading1` → `heading 1`)
//!
//! The container is opened with `zip` and the WordprocessingML is streamed
//! with `quick-xml`. Blocks are emitted in document order.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use tracing::{debug, instrument};
use zip::ZipArchive;
use zip::result::ZipError;

use doc2md_markdown::{post_process, render_table};
use doc2md_shared::{Doc2MdError, Result};

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";

// ---------------------------------------------------------------------------
// Parsed model
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Block {
    Paragraph(Paragraph),
    Table(Vec<Vec<String>>),
}

#[derive(Debug, Default)]
struct Paragraph {
    style_id: Option<String>,
    numbered: bool,
    runs: Vec<Run>,
}

#[derive(Debug, Default, Clone)]
struct Run {
    bold: bool,
    italic: bool,
    text: String,
}

impl Paragraph {
    fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Convert DOCX bytes to Markdown.
#[instrument(skip(content), fields(bytes = content.len()))]
pub fn convert_docx(content: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(content))
        .map_err(|e| Doc2MdError::parse(format!("failed to open DOCX as ZIP: {e}")))?;

    let document_xml = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or_else(|| Doc2MdError::parse(format!("DOCX is missing {DOCUMENT_PART}")))?;

    let styles = match read_part(&mut archive, STYLES_PART)? {
        Some(xml) => parse_styles(&xml)?,
        None => HashMap::new(),
    };

    let blocks = parse_document(&document_xml)?;
    debug!(blocks = blocks.len(), styles = styles.len(), "DOCX parsed");

    let parts: Vec<String> = blocks
        .iter()
        .filter_map(|block| match block {
            Block::Paragraph(p) => render_paragraph(p, &styles),
            Block::Table(rows) => Some(render_table(rows)).filter(|t| !t.is_empty()),
        })
        .collect();

    Ok(post_process(&parts.join("\n\n")))
}

/// Read a ZIP entry as UTF-8, `None` if the entry does not exist.
fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(Doc2MdError::parse(format!("failed to read {name}: {e}"))),
    };

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Doc2MdError::parse(format!("failed to read {name}: {e}")))?;
    Ok(Some(content))
}

// ---------------------------------------------------------------------------
// XML helpers
// ---------------------------------------------------------------------------

/// Extract an attribute value by key from an element.
fn get_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(std::result::Result::ok)
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// `<w:b/>` is on unless `w:val` is explicitly `0`/`false`.
fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(get_attr(e, b"w:val").as_deref(), Some("0" | "false" | "none"))
}

fn xml_error(part: &str, e: quick_xml::Error) -> Doc2MdError {
    Doc2MdError::parse(format!("malformed {part}: {e}"))
}

// ---------------------------------------------------------------------------
// styles.xml
// ---------------------------------------------------------------------------

/// Map style ids to their display names.
fn parse_styles(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut styles = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:style" => {
                current = get_attr(&e, b"w:styleId");
            }
            Ok(Event::Start(e) | Event::Empty(e)) if e.name().as_ref() == b"w:name" => {
                if let (Some(id), Some(name)) = (current.as_ref(), get_attr(&e, b"w:val")) {
                    styles.insert(id.clone(), name);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:style" => current = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(STYLES_PART, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(styles)
}

// ---------------------------------------------------------------------------
// document.xml
// ---------------------------------------------------------------------------

/// Streaming walker state for `word/document.xml`.
#[derive(Default)]
struct Walker {
    blocks: Vec<Block>,
    paragraph: Option<Paragraph>,
    run: Option<Run>,
    in_run_props: bool,
    in_text: bool,
    /// Nesting depth of `w:tbl`; nested tables flatten into their cell.
    table_depth: usize,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
    /// Paragraphs interrupted by a nested one (text boxes), innermost last.
    suspended: Vec<Suspended>,
    /// Depth inside `mc:Fallback`, which repeats its `mc:Choice` sibling.
    fallback_depth: usize,
}

/// An enclosing paragraph parked while a nested paragraph is read.
struct Suspended {
    paragraph: Paragraph,
    run: Option<Run>,
    in_run_props: bool,
}

impl Walker {
    fn start(&mut self, e: &BytesStart<'_>) {
        if self.fallback_depth > 0 {
            if e.name().as_ref() == b"mc:Fallback" {
                self.fallback_depth += 1;
            }
            return;
        }

        // Tables inside text boxes flatten into the enclosing paragraph.
        let structural = self.suspended.is_empty();
        match e.name().as_ref() {
            b"mc:Fallback" => self.fallback_depth += 1,
            b"w:tbl" if structural => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                }
            }
            b"w:tr" if structural && self.table_depth == 1 => self.row.clear(),
            b"w:tc" if structural && self.table_depth == 1 => self.cell.clear(),
            b"w:p" => {
                if let Some(paragraph) = self.paragraph.take() {
                    self.suspended.push(Suspended {
                        paragraph,
                        run: self.run.take(),
                        in_run_props: std::mem::take(&mut self.in_run_props),
                    });
                    self.in_text = false;
                }
                self.paragraph = Some(Paragraph::default());
            }
            b"w:r" if self.paragraph.is_some() => self.run = Some(Run::default()),
            b"w:rPr" if self.run.is_some() => self.in_run_props = true,
            b"w:t" if self.run.is_some() => self.in_text = true,
            _ => self.empty(e),
        }
    }

    /// Self-closing elements; also reached for property elements written
    /// with explicit end tags.
    fn empty(&mut self, e: &BytesStart<'_>) {
        if self.fallback_depth > 0 {
            return;
        }
        match e.name().as_ref() {
            b"w:pStyle" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.style_id = get_attr(e, b"w:val");
                }
            }
            b"w:numPr" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.numbered = true;
                }
            }
            b"w:b" if self.in_run_props => {
                if let Some(r) = self.run.as_mut() {
                    r.bold = toggle_on(e);
                }
            }
            b"w:i" if self.in_run_props => {
                if let Some(r) = self.run.as_mut() {
                    r.italic = toggle_on(e);
                }
            }
            b"w:tab" if !self.in_run_props => {
                if let Some(r) = self.run.as_mut() {
                    r.text.push('\t');
                }
            }
            b"w:br" | b"w:cr" => {
                if let Some(r) = self.run.as_mut() {
                    r.text.push('\n');
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        if self.fallback_depth > 0 {
            if name == b"mc:Fallback" {
                self.fallback_depth -= 1;
            }
            return;
        }

        let structural = self.suspended.is_empty();
        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:r" => {
                if let (Some(run), Some(p)) = (self.run.take(), self.paragraph.as_mut()) {
                    p.runs.push(run);
                }
            }
            b"w:p" => {
                if let Some(p) = self.paragraph.take() {
                    if let Some(outer) = self.suspended.pop() {
                        self.resume(outer, &p.plain_text());
                    } else if self.table_depth > 0 {
                        let text = p.plain_text();
                        if !text.trim().is_empty() {
                            self.cell.push(text.trim().to_string());
                        }
                    } else {
                        self.blocks.push(Block::Paragraph(p));
                    }
                }
            }
            b"w:tc" if structural && self.table_depth == 1 => {
                self.row.push(self.cell.join(" "));
                self.cell.clear();
            }
            b"w:tr" if structural && self.table_depth == 1 => {
                self.rows.push(std::mem::take(&mut self.row));
            }
            b"w:tbl" if structural => {
                if self.table_depth == 1 {
                    let rows = std::mem::take(&mut self.rows);
                    if !rows.is_empty() {
                        self.blocks.push(Block::Table(rows));
                    }
                }
                self.table_depth = self.table_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    /// Restore the enclosing paragraph, folding the nested text into it.
    fn resume(&mut self, outer: Suspended, nested: &str) {
        let mut paragraph = outer.paragraph;
        let mut run = outer.run;
        self.in_run_props = outer.in_run_props;

        let nested = nested.trim();
        if !nested.is_empty() {
            let before = match run.as_ref() {
                Some(r) if !r.text.is_empty() => r.text.clone(),
                _ => paragraph.plain_text(),
            };
            let mut text = String::new();
            if !before.is_empty() && !before.ends_with(char::is_whitespace) {
                text.push(' ');
            }
            text.push_str(nested);

            match run.as_mut() {
                Some(r) => r.text.push_str(&text),
                None => paragraph.runs.push(Run {
                    text,
                    ..Run::default()
                }),
            }
        }

        self.paragraph = Some(paragraph);
        self.run = run;
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            if let Some(r) = self.run.as_mut() {
                r.text.push_str(text);
            }
        }
    }
}

/// Walk `word/document.xml` into paragraphs and tables.
fn parse_document(xml: &str) -> Result<Vec<Block>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut walker = Walker::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => walker.start(&e),
            Ok(Event::Empty(e)) => walker.empty(&e),
            Ok(Event::End(e)) => walker.end(e.name().as_ref()),
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| xml_error(DOCUMENT_PART, e))?;
                walker.text(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(DOCUMENT_PART, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(walker.blocks)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render a paragraph by its style; `None` for empty paragraphs.
fn render_paragraph(p: &Paragraph, styles: &HashMap<String, String>) -> Option<String> {
    let plain = p.plain_text();
    let text = plain.trim();
    if text.is_empty() {
        return None;
    }

    let style = p
        .style_id
        .as_ref()
        .map(|id| styles.get(id).unwrap_or(id).to_lowercase())
        .unwrap_or_default();

    if let Some(level) = heading_level(&style) {
        return Some(format!("{} {text}", "#".repeat(level)));
    }
    if style.contains("title") {
        return Some(format!("# {text}"));
    }
    if style.contains("list") || p.numbered {
        return Some(format!("- {text}"));
    }

    Some(format_runs(&p.runs).trim().to_string())
}

/// Heading level from a lower-cased style name (`heading 2`, `heading2`).
fn heading_level(style: &str) -> Option<usize> {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"heading\s*([1-6])\b").expect("valid regex"));

    HEADING_RE
        .captures(style)
        .and_then(|c| c[1].parse().ok())
}

/// Render runs with emphasis, merging neighbours that share formatting.
///
/// Markers hug the text; surrounding whitespace stays outside them.
fn format_runs(runs: &[Run]) -> String {
    let mut merged: Vec<Run> = Vec::new();
    for run in runs.iter().filter(|r| !r.text.is_empty()) {
        match merged.last_mut() {
            Some(last) if last.bold == run.bold && last.italic == run.italic => {
                last.text.push_str(&run.text);
            }
            _ => merged.push(run.clone()),
        }
    }

    let mut out = String::new();
    for run in &merged {
        let marker = match (run.bold, run.italic) {
            (true, true) => "***",
            (true, false) => "**",
            (false, true) => "*",
            (false, false) => "",
        };
        let inner = run.text.trim();
        if marker.is_empty() || inner.is_empty() {
            out.push_str(&run.text);
            continue;
        }
        let lead = &run.text[..run.text.len() - run.text.trim_start().len()];
        let trail = &run.text[run.text.trim_end().len()..];
        out.push_str(lead);
        out.push_str(marker);
        out.push_str(inner);
        out.push_str(marker);
        out.push_str(trail);
    }
    out
}
