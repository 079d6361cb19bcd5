//! Report extractor: parses an HTML assessment report into assessment
//! records.
//!
//! The report format is owned by the upstream assessment tool, so the HTML
//! is treated as an untrusted parse target. Extraction is a narrow
//! table-pattern matcher: locate tables whose header row names a database
//! and a collection column, then read each body row as one record. The
//! rest of the markup is ignored, which keeps layout changes around the
//! tables from breaking the pipeline.

use tracing::warn;

use crate::error::{Error, Result};
use crate::schema::AssessmentRecord;

/// A row that could not be parsed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    /// Zero-based index of the table within the document.
    pub table: usize,
    /// Zero-based body-row index within the table.
    pub row: usize,
    /// Why the row was rejected.
    pub reason: String,
}

/// Result of an extraction run: the recovered records plus per-row
/// warnings for anything that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Records recovered from the report, in document order.
    pub records: Vec<AssessmentRecord>,
    /// Rows that were skipped, for the caller's summary output.
    pub skipped: Vec<RowWarning>,
}

/// Column layout of a recognized inventory table.
struct ColumnMap {
    database: usize,
    collection: usize,
    doc_count: Option<usize>,
    size: Option<usize>,
}

/// Extract assessment records from an HTML report.
///
/// Partial extraction is acceptable: malformed rows are skipped with a
/// warning and extraction continues. Total failure is not: if no table
/// with a recognizable header exists, or tables exist but zero rows are
/// recoverable, this returns `Error::Parse`.
///
/// # Errors
///
/// Returns `Error::Parse` when the document yields no records.
pub fn extract_records(html: &str) -> Result<Extraction> {
    let tables = scan_tables(html);
    if tables.is_empty() {
        return Err(Error::Parse(
            "no <table> elements found in report".to_string(),
        ));
    }

    let mut extraction = Extraction::default();
    let mut recognized_tables = 0usize;

    for (table_idx, rows) in tables.iter().enumerate() {
        let Some((header_row, columns)) = recognize_header(rows) else {
            continue;
        };
        recognized_tables += 1;

        for (row_idx, cells) in rows.iter().enumerate().skip(header_row + 1) {
            match parse_row(cells, &columns) {
                Ok(record) => {
                    let duplicate = extraction.records.iter().any(|r| {
                        r.database == record.database && r.collection == record.collection
                    });
                    if duplicate {
                        warn!(
                            database = %record.database,
                            collection = %record.collection,
                            "duplicate row in report, keeping first occurrence"
                        );
                        extraction.skipped.push(RowWarning {
                            table: table_idx,
                            row: row_idx - header_row - 1,
                            reason: format!(
                                "duplicate entry for {}.{}",
                                record.database, record.collection
                            ),
                        });
                    } else {
                        extraction.records.push(record);
                    }
                }
                Err(Error::MalformedRow(reason)) => {
                    warn!(table = table_idx, row = row_idx, %reason, "skipping malformed row");
                    extraction.skipped.push(RowWarning {
                        table: table_idx,
                        row: row_idx - header_row - 1,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    if recognized_tables == 0 {
        return Err(Error::Parse(
            "no table with database/collection columns found in report".to_string(),
        ));
    }
    if extraction.records.is_empty() {
        return Err(Error::Parse(
            "inventory tables found but no rows could be parsed".to_string(),
        ));
    }

    Ok(extraction)
}

/// Find the header row and map its columns. Returns `None` when the table
/// has no row naming both a database and a collection column.
fn recognize_header(rows: &[Vec<String>]) -> Option<(usize, ColumnMap)> {
    for (idx, cells) in rows.iter().enumerate() {
        let lowered: Vec<String> = cells.iter().map(|c| c.to_lowercase()).collect();

        let database = lowered
            .iter()
            .position(|c| c.contains("database") || c == "db");
        let collection = lowered.iter().position(|c| c.contains("collection"));

        if let (Some(database), Some(collection)) = (database, collection) {
            let doc_count = lowered
                .iter()
                .position(|c| c.contains("doc") || c.contains("count"));
            let size = lowered.iter().position(|c| c.contains("size"));
            return Some((
                idx,
                ColumnMap {
                    database,
                    collection,
                    doc_count,
                    size,
                },
            ));
        }
    }
    None
}

/// Parse one body row against the column map.
fn parse_row(cells: &[String], columns: &ColumnMap) -> Result<AssessmentRecord> {
    let database = cells
        .get(columns.database)
        .map(String::as_str)
        .unwrap_or("")
        .trim();
    let collection = cells
        .get(columns.collection)
        .map(String::as_str)
        .unwrap_or("")
        .trim();

    if database.is_empty() {
        return Err(Error::MalformedRow("empty database name".to_string()));
    }
    if collection.is_empty() {
        return Err(Error::MalformedRow("empty collection name".to_string()));
    }

    let doc_count = match columns.doc_count.and_then(|i| cells.get(i)) {
        Some(cell) => parse_count(cell)?,
        None => 0,
    };

    let data_size_gb = match columns.size.and_then(|i| cells.get(i)) {
        Some(cell) => parse_size_gb(cell)?,
        None => 0.0,
    };

    Ok(AssessmentRecord {
        database: database.to_string(),
        collection: collection.to_string(),
        doc_count,
        data_size_gb,
    })
}

/// Parse a document count, tolerating thousands separators ("21,349").
fn parse_count(cell: &str) -> Result<u64> {
    let cleaned: String = cell.chars().filter(|c| !matches!(c, ',' | ' ')).collect();
    if cleaned.is_empty() {
        return Ok(0);
    }
    cleaned
        .parse::<u64>()
        .map_err(|_| Error::MalformedRow(format!("unparsable document count '{}'", cell.trim())))
}

/// Parse a size cell, normalizing to gigabytes. Accepts "0.032 GB",
/// "33 MB", a bare number (assumed GB) or an empty cell (0.0).
fn parse_size_gb(cell: &str) -> Result<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return Ok(0.0);
    }

    let lowered = trimmed.to_lowercase();
    let (number, divisor) = if let Some(rest) = lowered.strip_suffix("gb") {
        (rest.trim_end(), 1.0)
    } else if let Some(rest) = lowered.strip_suffix("mb") {
        (rest.trim_end(), 1024.0)
    } else {
        (lowered.as_str(), 1.0)
    };

    let value: f64 = number
        .replace(',', "")
        .parse()
        .map_err(|_| Error::MalformedRow(format!("unparsable size '{trimmed}'")))?;

    if value < 0.0 {
        return Err(Error::MalformedRow(format!("negative size '{trimmed}'")));
    }

    Ok(value / divisor)
}

/// Scan the document for tables and return their rows as plain-text cells.
///
/// Tag matching is case-insensitive and attribute-tolerant. Nested markup
/// inside a cell is stripped; basic entities are decoded.
fn scan_tables(html: &str) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut cursor = 0;

    while let Some(open) = find_tag(html, "table", cursor) {
        let body_start = match find_char(html, '>', open) {
            Some(i) => i + 1,
            None => break,
        };
        let close = find_close(html, "table", body_start).unwrap_or(html.len());
        tables.push(scan_rows(&html[body_start..close]));
        cursor = close;
    }

    tables
}

fn scan_rows(table_body: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut cursor = 0;

    while let Some(open) = find_tag(table_body, "tr", cursor) {
        let body_start = match find_char(table_body, '>', open) {
            Some(i) => i + 1,
            None => break,
        };
        // A row ends at </tr> or, in sloppy markup, at the next <tr>.
        let close = find_close(table_body, "tr", body_start)
            .or_else(|| find_tag(table_body, "tr", body_start))
            .unwrap_or(table_body.len());
        let cells = scan_cells(&table_body[body_start..close]);
        if !cells.is_empty() {
            rows.push(cells);
        }
        cursor = close.max(body_start);
    }

    rows
}

fn scan_cells(row_body: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cursor = 0;

    loop {
        let td = find_tag(row_body, "td", cursor);
        let th = find_tag(row_body, "th", cursor);
        let open = match (td, th) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => break,
        };
        let body_start = match find_char(row_body, '>', open) {
            Some(i) => i + 1,
            None => break,
        };
        // A cell ends at its closing tag or at the next cell opening.
        let mut close = row_body.len();
        for candidate in [
            find_close(row_body, "td", body_start),
            find_close(row_body, "th", body_start),
            find_tag(row_body, "td", body_start),
            find_tag(row_body, "th", body_start),
        ]
        .into_iter()
        .flatten()
        {
            close = close.min(candidate);
        }
        cells.push(cell_text(&row_body[body_start..close]));
        cursor = close.max(body_start);
    }

    cells
}

/// Strip remaining tags, decode basic entities and collapse whitespace.
fn cell_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }

    let decoded = decode_entities(&out);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';').filter(|&i| i <= 8) else {
            out.push('&');
            rest = &rest[amp + 1..];
            continue;
        };
        let entity = &tail[1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            "nbsp" => out.push(' '),
            _ => {
                if let Some(code) = entity
                    .strip_prefix('#')
                    .and_then(|d| d.parse::<u32>().ok())
                    .and_then(char::from_u32)
                {
                    out.push(code);
                } else {
                    // Unknown entity, keep it verbatim.
                    out.push_str(&tail[..=semi]);
                }
            }
        }
        rest = &tail[semi + 1..];
    }

    out.push_str(rest);
    out
}

/// ASCII-case-insensitive substring search on bytes. Byte offsets stay
/// valid for the original string regardless of non-ASCII report content.
fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|pos| from + pos)
}

/// Find the byte offset of an opening tag `<name` followed by a delimiter
/// (whitespace, `>` or `/`), case-insensitively, at or after `from`.
fn find_tag(html: &str, name: &str, from: usize) -> Option<usize> {
    let needle = format!("<{name}");
    let mut cursor = from;

    while let Some(abs) = find_ci(html, &needle, cursor) {
        let after = abs + needle.len();
        match html.as_bytes().get(after) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'/')
            | None => return Some(abs),
            _ => cursor = after,
        }
    }
    None
}

/// Find the byte offset of a closing tag `</name` at or after `from`.
/// Returns the offset of the `<` so callers can slice up to it.
fn find_close(html: &str, name: &str, from: usize) -> Option<usize> {
    find_ci(html, &format!("</{name}"), from)
}

fn find_char(html: &str, ch: char, from: usize) -> Option<usize> {
    html[from..].find(ch).map(|pos| from + pos)
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
