//! Post-conversion cleanup pipeline for Markdown output.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! HTML output gets the full pipeline; text extracted from PDF and DOCX only
//! gets the format-independent passes through [`post_process`].

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Run the full cleanup pipeline on Markdown converted from HTML.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = md.to_string();

    result = normalize_headings(&result);
    result = fix_code_block_languages(&result);
    result = strip_leftover_html(&result);
    result = resolve_links(&result, base_url);
    result = post_process(&result);

    result
}

/// Normalize Markdown produced by any converter.
///
/// Trims trailing whitespace on every line, rewrites bullets to `-`,
/// collapses runs of blank lines to one, and trims the document.
pub fn post_process(md: &str) -> String {
    let mut result = normalize_whitespace(md);
    result = normalize_bullets(&result);
    result = clean_blank_lines(&result);
    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass: Normalize heading levels
// ---------------------------------------------------------------------------

/// Ensure there's at most one H1; later H1s become H2.
fn normalize_headings(md: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex"));

    let mut h1_count = 0;
    let mut in_code_block = false;
    let mut lines: Vec<String> = Vec::new();

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
        }
        if !in_code_block {
            if let Some(caps) = H_RE.captures(line) {
                if &caps[1] == "#" {
                    h1_count += 1;
                    if h1_count > 1 {
                        lines.push(format!("## {}", &caps[2]));
                        continue;
                    }
                }
            }
        }
        lines.push(line.to_string());
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass: Collapse blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ newlines into a single blank line.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass: Fix code block language hints
// ---------------------------------------------------------------------------

/// Strip class-like prefixes from code fence language hints.
///
/// Handles patterns like `language-js`, `lang-python`, `highlight-rust`.
fn fix_code_block_languages(md: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^```(?:language-|lang-|highlight-)(\w+)").expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(md, "```$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove layout tags that survived the conversion, keeping their text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|main)(?:\s[^>]*)?>")
            .expect("valid regex")
    });

    map_outside_code(md, |line| HTML_TAG_RE.replace_all(line, "").to_string())
}

// ---------------------------------------------------------------------------
// Pass: Resolve relative links
// ---------------------------------------------------------------------------

/// Resolve relative URLs in Markdown links against a base URL.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            let text = &caps[1];
            let href = &caps[2];

            if href.starts_with("http://")
                || href.starts_with("https://")
                || href.starts_with('#')
                || href.starts_with("mailto:")
                || href.starts_with("data:")
            {
                return caps[0].to_string();
            }

            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass: Normalize bullets
// ---------------------------------------------------------------------------

/// Rewrite `*`/`+` bullets (and padded `-` bullets) to a single `- `.
fn normalize_bullets(md: &str) -> String {
    static BULLET_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(\s*)[*+-][ \t]+(\S)").expect("valid regex"));

    map_outside_code(md, |line| {
        if is_thematic_break(line) {
            return line.to_string();
        }
        BULLET_RE.replace(line, "$1- $2").to_string()
    })
}

/// `***`, `- - -`, `___` and friends.
fn is_thematic_break(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '*' | '-' | '_')
        && marks.iter().all(|&c| c == marks[0])
}

// ---------------------------------------------------------------------------
// Pass: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line and normalize line endings.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Apply `f` to every line outside fenced code blocks.
fn map_outside_code(md: &str, f: impl Fn(&str) -> String) -> String {
    let mut in_code_block = false;

    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
                return line.to_string();
            }
            if in_code_block {
                line.to_string()
            } else {
                f(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
