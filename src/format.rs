//! Result formatting and export.
//!
//! Shapes query results into delimited text, structured JSON documents, and
//! display-ready summaries. Exports of empty result sets are rejected rather
//! than producing degenerate files.

use crate::error::{ConduitError, Result};
use crate::gateway::QueryResult;
use serde::Serialize;

/// Compact description of a result for display.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    /// Number of returned rows.
    pub row_count: usize,

    /// Number of columns.
    pub column_count: usize,

    /// Execution time in milliseconds.
    pub elapsed_ms: u64,

    /// Whether the row list was truncated.
    pub truncated: bool,
}

/// Exports a result as delimited text.
///
/// Emits one header line of column names followed by one line per row, with
/// fields quoted and embedded quote characters doubled as needed for the
/// delimiter.
pub fn to_delimited_text(result: &QueryResult, delimiter: u8) -> Result<String> {
    if result.rows.is_empty() {
        return Err(ConduitError::validation("No rows to export"));
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer
        .write_record(result.columns.iter().map(|c| c.name.as_str()))
        .map_err(|e| ConduitError::internal(format!("Failed to write header: {e}")))?;

    for row in &result.rows {
        writer
            .write_record(row.iter().map(|v| v.to_display_string()))
            .map_err(|e| ConduitError::internal(format!("Failed to write row: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ConduitError::internal(format!("Failed to flush export: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ConduitError::internal(format!("Export is not valid UTF-8: {e}")))
}

/// Exports a result as a JSON array of row objects keyed by column name.
pub fn to_structured_document(result: &QueryResult) -> Result<String> {
    if result.rows.is_empty() {
        return Err(ConduitError::validation("No rows to export"));
    }

    let documents: Vec<serde_json::Value> = result
        .rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (column, value) in result.columns.iter().zip(row.iter()) {
                object.insert(column.name.clone(), value.to_json());
            }
            serde_json::Value::Object(object)
        })
        .collect();

    serde_json::to_string_pretty(&documents)
        .map_err(|e| ConduitError::internal(format!("Failed to encode export: {e}")))
}

/// Summarizes a result for display.
pub fn summarize(result: &QueryResult) -> ResultSummary {
    ResultSummary {
        row_count: result.row_count,
        column_count: result.columns.len(),
        elapsed_ms: result.elapsed_ms,
        truncated: result.metadata.truncated,
    }
}

/// Renders a result as an aligned text table for terminal display.
///
/// Unlike the export formats, an empty result renders as a row-count note so
/// interactive callers always see something.
pub fn to_display_table(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.name.len()).collect();
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_display_string()).collect())
        .collect();

    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() && cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:<width$}", c.name, width = widths[i]))
        .collect();
    out.push_str(&header.join(" | "));
    out.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&separator.join("-+-"));
    out.push('\n');

    for row in &rendered {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(cell.len());
                format!("{:<width$}", cell, width = width)
            })
            .collect();
        out.push_str(&line.join(" | "));
        out.push('\n');
    }

    out.push_str(&format!("({} rows)", result.row_count));
    out
}
