//! Markdown pipe-table rendering.
//!
//! `htmd` 0.1 doesn't support table conversion, so HTML tables are rendered
//! here and spliced back into the converted output through placeholders.

use scraper::{ElementRef, Selector};

/// Render rows as a GFM pipe table. The first row is the header.
///
/// Short rows are padded to the widest row; `|` in cells is escaped.
/// Returns an empty string when there is nothing to render.
pub fn render_table(rows: &[Vec<String>]) -> String {
    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    let mut md = String::new();
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..col_count)
            .map(|c| row.get(c).map(|cell| escape_cell(cell)).unwrap_or_default())
            .collect();
        md.push_str("| ");
        md.push_str(&cells.join(" | "));
        md.push_str(" |\n");

        if i == 0 {
            md.push_str("| ");
            md.push_str(&vec!["---"; col_count].join(" | "));
            md.push_str(" |\n");
        }
    }

    md.truncate(md.trim_end().len());
    md
}

/// Collapse internal whitespace and escape pipes so a cell stays on one row.
fn escape_cell(cell: &str) -> String {
    cell.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

/// Convert a single HTML table element to a Markdown table string.
pub(crate) fn html_table_to_markdown(table: &ElementRef<'_>) -> String {
    let tr_sel = Selector::parse("tr").expect("valid selector");
    let cell_sel = Selector::parse("th, td").expect("valid selector");

    let rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| cell.text().collect::<String>())
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    render_table(&rows)
}

/// Placeholder token standing in for the `index`-th table during conversion.
///
/// Alphanumeric only, so `htmd` passes it through without escaping.
pub(crate) fn placeholder(index: usize) -> String {
    format!("XDOC2MDTABLE{index}X")
}

/// Swap placeholders in converted Markdown for their rendered tables.
pub(crate) fn restore_tables(md: &str, tables: &[String]) -> String {
    let mut result = md.to_string();
    for (i, table) in tables.iter().enumerate() {
        result = result.replacen(&placeholder(i), &format!("\n\n{table}\n\n"), 1);
    }
    result
}
