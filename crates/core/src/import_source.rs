//! Batch input loader: turns an uploaded CSV or JSON document into an
//! ordered table of named cells.
//!
//! Cells keep their header names here; renaming headers to columns is the
//! importer's job.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::employee::RawRecord;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Comma-separated text, first record is the header line.
    Csv,
    /// A JSON array of objects keyed by header.
    Json,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// The source could not be parsed into a table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SourceError(pub String);

/// An ordered table of rows keyed by header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportTable {
    /// Headers in the order they appeared.
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl ImportTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse `data` in the given format.
pub fn load(format: SourceFormat, data: &str) -> Result<ImportTable, SourceError> {
    match format {
        SourceFormat::Csv => parse_csv(data),
        SourceFormat::Json => parse_json(data),
    }
}

/// Parse CSV text. Headers are trimmed; empty cells become null. Short rows
/// leave their trailing headers unset.
pub fn parse_csv(data: &str) -> Result<ImportTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SourceError(format!("Invalid CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| SourceError(format!("Invalid CSV: {e}")))?;
        let row: RawRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (header.clone(), value)
            })
            .collect();
        rows.push(row);
    }

    Ok(ImportTable { headers, rows })
}

/// Parse a JSON array of objects. The header set is the union of every
/// object's keys, in first-seen order.
pub fn parse_json(data: &str) -> Result<ImportTable, SourceError> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| SourceError(format!("Invalid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(SourceError("Expected a JSON array of row objects".into()));
    };

    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(row) = item else {
            return Err(SourceError(format!(
                "Row {} is not a JSON object",
                index + 1
            )));
        };
        for key in row.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
        rows.push(row);
    }

    Ok(ImportTable { headers, rows })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
