//! In-memory tabular input handed to the pipeline by the file-fetch collaborator.
//!
//! Column names are untrusted: they are kept exactly as the producer wrote them
//! (padding, casing and typos included) and only interpreted by the reconciler.

use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde_json::Value;

use crate::error::Result;

/// Cell spellings that pandas-produced files use for a missing value.
const NULL_MARKERS: [&str; 7] = ["nan", "na", "n/a", "null", "none", "<na>", "#n/a"];

/// A scalar cell of unknown type.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Null,
}

impl RawValue {
    /// Classify a raw CSV cell: blanks and NaN spellings become `Null`.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() || NULL_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
            RawValue::Null
        } else {
            RawValue::Text(cell.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Number(n) => n.is_nan(),
            RawValue::Text(_) => false,
        }
    }

    /// Text view of the cell. Integral numbers render without a fractional part.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Number(n) if n.is_nan() => None,
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Null => None,
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::String(s) => RawValue::from_cell(s),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
            Value::Bool(b) => RawValue::Text(b.to_string()),
            other => RawValue::Text(other.to_string()),
        }
    }
}

/// One input row: ordered `(column, value)` pairs exactly as delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, RawValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: RawValue) {
        self.cells.push((column.into(), value));
    }

    pub fn with(mut self, column: impl Into<String>, value: RawValue) -> Self {
        self.push(column, value);
        self
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Guess the format from a file extension; anything that is not `.json` is read as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => InputFormat::Json,
            _ => InputFormat::Csv,
        }
    }
}

/// Rows × named columns, as fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularBuffer {
    rows: Vec<RawRow>,
}

impl TabularBuffer {
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }

    /// Read a CSV with a header row. Short rows read their missing trailing cells as `Null`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row = RawRow::new();
            for (i, column) in headers.iter().enumerate() {
                let value = record.get(i).map_or(RawValue::Null, RawValue::from_cell);
                row.push(column.clone(), value);
            }
            rows.push(row);
        }
        Ok(Self { rows })
    }

    /// Read a JSON array of flat objects.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let records: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(bytes)?;
        let rows = records
            .iter()
            .map(|obj| {
                let mut row = RawRow::new();
                for (column, value) in obj {
                    row.push(column.clone(), RawValue::from(value));
                }
                row
            })
            .collect();
        Ok(Self { rows })
    }

    pub fn from_bytes(bytes: &[u8], format: InputFormat) -> Result<Self> {
        match format {
            InputFormat::Csv => Self::from_csv_reader(bytes),
            InputFormat::Json => Self::from_json_slice(bytes),
        }
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<RawRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
