//! Output formatting utilities for the CLI
//!
//! Renders JSON records as pretty JSON, a table or CSV. Table and CSV take
//! their columns from the keys of the first record.

use buffer_core::ErrorReport;
use colored::*;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tabled::{builder::Builder, settings::Style};
use thiserror::Error;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Table => "table",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(FormatError::UnknownFormat(other.to_string())),
        }
    }
}

/// Formatting errors
#[derive(Error, Debug)]
pub enum FormatError {
    /// Table/CSV input that is not an object or an array of objects
    #[error("cannot render {found} as a {format} row; expected a JSON object")]
    NotARecord {
        found: &'static str,
        format: OutputFormat,
    },

    #[error("unknown output format '{0}' (expected json, table or csv)")]
    UnknownFormat(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Render `value` in the requested format.
///
/// A single object renders as a one-row table/CSV. An empty array renders as
/// `No data` (table) or an empty string (CSV).
pub fn format_output(value: &Value, format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => {
            let rows = records(value, format)?;
            let Some(columns) = column_names(&rows) else {
                return Ok("No data".to_string());
            };

            let mut builder = Builder::default();
            builder.push_record(columns.iter().cloned());
            for row in &rows {
                builder.push_record(columns.iter().map(|column| cell(row.get(column))));
            }

            Ok(builder.build().with(Style::rounded()).to_string())
        }
        OutputFormat::Csv => {
            let rows = records(value, format)?;
            let Some(columns) = column_names(&rows) else {
                return Ok(String::new());
            };

            let mut lines = Vec::with_capacity(rows.len() + 1);
            lines.push(csv_line(columns.iter().cloned()));
            for row in &rows {
                lines.push(csv_line(columns.iter().map(|column| cell(row.get(column)))));
            }

            Ok(lines.join("\n"))
        }
    }
}

/// Render an error report (`{code, message, retry_after}`) in the requested
/// format.
pub fn format_error(report: &ErrorReport, format: OutputFormat) -> Result<String, FormatError> {
    format_output(&serde_json::to_value(report)?, format)
}

/// Format success message
pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}

fn records(value: &Value, format: OutputFormat) -> Result<Vec<&Map<String, Value>>, FormatError> {
    match value {
        Value::Object(record) => Ok(vec![record]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object().ok_or(FormatError::NotARecord {
                    found: kind(item),
                    format,
                })
            })
            .collect(),
        other => Err(FormatError::NotARecord {
            found: kind(other),
            format,
        }),
    }
}

/// Column names from the first record; `None` when there is nothing to show.
fn column_names(rows: &[&Map<String, Value>]) -> Option<Vec<String>> {
    let first = rows.first()?;
    if first.is_empty() {
        return None;
    }
    Some(first.keys().cloned().collect())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_line(fields: impl Iterator<Item = String>) -> String {
    fields
        .map(|field| csv_field(&field))
        .collect::<Vec<_>>()
        .join(",")
}

/// Quote a field only when it contains a delimiter, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
