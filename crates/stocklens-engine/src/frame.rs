//! In-memory tabular data representation
//!
//! A [`Frame`] is an ordered list of column names plus a list of rows, where
//! each row maps column names to cell values. Raw cells loaded from CSV are
//! always strings; pipeline steps append derived cells that may be numbers.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::EngineError;

/// One row of data: column name -> cell value
pub type Row = HashMap<String, Value>;

/// Ordered tabular data
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Column names in source order; derived columns are appended
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Register a column name, keeping the first occurrence's position
    pub fn add_column(&mut self, name: &str) {
        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
    }
}

/// Parse a delimited file into a [`Frame`]
///
/// Relaxed-column-count policy: rows with more fields than the header are
/// truncated, rows with fewer are padded with empty strings, and rows that
/// cannot be decoded at all are skipped rather than aborting the load.
pub fn load_csv(bytes: &[u8]) -> Result<Frame, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| EngineError::InvalidCsv(e.to_string()))?;
    let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable row");
                skipped += 1;
                continue;
            }
        };

        let mut row = Row::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            row.insert(column.clone(), Value::String(cell.to_string()));
        }
        rows.push(row);
    }

    if skipped > 0 {
        tracing::warn!(skipped, "Skipped malformed rows during load");
    }
    tracing::debug!(rows = rows.len(), columns = columns.len(), "Loaded CSV");

    Ok(Frame { columns, rows })
}

/// Render a cell the way it would print: strings as-is, numbers formatted,
/// anything else (or a missing cell) as the empty string
pub fn cell_text(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Numeric view of a cell: native numbers pass through, non-empty strings
/// are parsed strictly, everything else is `None`
pub fn cell_f64(row: &Row, column: &str) -> Option<f64> {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

/// Missing means: no cell, an explicit null, or an empty string
pub fn is_missing(row: &Row, column: &str) -> bool {
    match row.get(column) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}
