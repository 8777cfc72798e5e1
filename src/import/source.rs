use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{IngestError, RowError};

/// One loosely-typed CSV data row, keyed by trimmed header name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RawRow {
    /// 1-based line in the source file.
    pub(crate) line: usize,
    pub(crate) fields: BTreeMap<String, String>,
}

impl RawRow {
    #[cfg(test)]
    pub(crate) fn from_pairs(line: usize, pairs: &[(&str, &str)]) -> Self {
        Self {
            line,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub(crate) fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(header).map(|s| s.as_str())
    }
}

/// Rows plus any per-line parse errors, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ParsedCsv {
    pub(crate) headers: Vec<String>,
    pub(crate) rows: Vec<RawRow>,
    pub(crate) errors: Vec<RowError>,
}

impl ParsedCsv {
    /// Wrap rows that were parsed elsewhere. Headers are the union of the
    /// rows' field names in first-seen order.
    pub(crate) fn from_rows(rows: Vec<RawRow>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for row in &rows {
            for name in row.fields.keys() {
                if !headers.contains(name) {
                    headers.push(name.clone());
                }
            }
        }
        Self {
            headers,
            rows,
            errors: Vec::new(),
        }
    }
}

// Not flexible: a record with the wrong field count is a row error.
pub(crate) fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).trim(csv::Trim::All);
    builder
}

/// Parse a whole CSV document in one go. Malformed lines become `parse`
/// errors; only a missing header row fails the call.
pub(crate) fn parse_csv(text: &str) -> Result<ParsedCsv, IngestError> {
    let mut rdr = reader_builder().from_reader(text.as_bytes());
    let headers = read_headers(&mut rdr)?;

    let mut parsed = ParsedCsv {
        headers,
        ..ParsedCsv::default()
    };
    let mut record = csv::StringRecord::new();
    loop {
        match rdr.read_record(&mut record) {
            Ok(true) => {
                if let Some(row) = record_to_row(&parsed.headers, &record) {
                    parsed.rows.push(row);
                }
            }
            Ok(false) => break,
            Err(e) => parsed.errors.push(parse_error(&e)),
        }
    }
    Ok(parsed)
}

pub(crate) fn read_headers<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
) -> Result<Vec<String>, IngestError> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(IngestError::EmptySource);
    }
    Ok(headers)
}

/// Blank lines (every field empty) yield `None`.
pub(crate) fn record_to_row(headers: &[String], record: &csv::StringRecord) -> Option<RawRow> {
    if record.iter().all(|f| f.is_empty()) {
        return None;
    }
    let line = record.position().map_or(0, |p| p.line() as usize);
    let fields = headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.clone(), v.to_string()))
        .collect();
    Some(RawRow { line, fields })
}

pub(crate) fn parse_error(e: &csv::Error) -> RowError {
    RowError::Parse {
        line: e.position().map(|p| p.line() as usize),
        message: e.to_string(),
    }
}

pub(crate) fn read_source(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Source {
        path: path.display().to_string(),
        source,
    })
}

/// Rows exported as a JSON array of flat objects. Numbers and booleans are
/// stringified, nulls and nested values become empty fields. Element `n` is
/// reported as line `n + 2`, matching a CSV with a header row.
pub(crate) fn parse_json_rows(text: &str) -> Result<ParsedCsv, IngestError> {
    let records: Vec<BTreeMap<String, serde_json::Value>> = serde_json::from_str(text)?;
    let rows = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| RawRow {
            line: i + 2,
            fields: record
                .into_iter()
                .map(|(k, v)| (k.trim().to_string(), json_field(v)))
                .collect(),
        })
        .collect();
    Ok(ParsedCsv::from_rows(rows))
}

fn json_field(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// First 16 hex chars of the SHA-256 of `bytes`.
pub(crate) fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

/// Hash pre-parsed rows by their canonical field order, ignoring line numbers.
pub(crate) fn rows_hash(rows: &[RawRow]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        for (k, v) in &row.fields {
            hasher.update(k.as_bytes());
            hasher.update([0x1f]);
            hasher.update(v.as_bytes());
            hasher.update([0x1e]);
        }
        hasher.update(b"\n");
    }
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
