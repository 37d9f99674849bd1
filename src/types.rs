//! Core data model types for decoding and loading.
//!
//! Decoding produces a [`DecodedTable`]: a positional [`Header`] plus rows of [`CellValue`]s.
//! A caller turns that into an [`ImportPlan`] (via [`crate::schema::plan`]) and hands both to the
//! loader, which reports an [`ImportOutcome`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Container kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// Delimited text (CSV and friends).
    DelimitedText,
    /// Spreadsheet workbook (`.xlsx`, `.xls`, `.ods`, ...).
    Spreadsheet,
}

impl ContainerKind {
    /// Parse a container kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(Self::DelimitedText),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// A single scalar cell.
///
/// Serializes untagged, so `Null` renders as JSON `null` and numbers as JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Absent or empty cell.
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Value as bound on insert: empty text collapses to `Null`.
    pub fn normalized(&self) -> CellValue {
        match self {
            Self::Text(s) if s.is_empty() => Self::Null,
            other => other.clone(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

/// Ordered header names, addressed by position. Duplicate names are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate header names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    /// Name at `idx`, if in range.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(|s| s.as_str())
    }

    /// Position of the first header with this name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|h| h == name)
    }

    /// True when there are no names or every name is blank.
    pub fn is_blank(&self) -> bool {
        self.names.iter().all(|h| h.trim().is_empty())
    }
}

/// Decoded file contents.
///
/// Every row has exactly `header.len()` slots; absent cells are [`CellValue::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTable {
    header: Header,
    rows: Vec<Vec<CellValue>>,
}

impl DecodedTable {
    /// Build a table, padding short rows with `Null` and truncating long ones to the header
    /// width.
    pub fn new(header: Header, rows: Vec<Vec<CellValue>>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        Self { header, rows }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of data rows (the header is not counted).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at (`row`, header named `name`); the first matching header wins.
    pub fn cell(&self, row: usize, name: &str) -> Option<&CellValue> {
        let col = self.header.position(name)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

/// Declared SQLite storage type of a destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Blob,
    Null,
}

impl ColumnType {
    pub const ALL: [ColumnType; 5] = [
        ColumnType::Text,
        ColumnType::Integer,
        ColumnType::Real,
        ColumnType::Blob,
        ColumnType::Null,
    ];

    /// Keyword used in `CREATE TABLE`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
            Self::Null => "NULL",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for ColumnType {
    type Err = ();

    /// Exact match against the closed set; lowercase spellings are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_sql() == s).ok_or(())
    }
}

/// Caller-supplied column description, before validation.
///
/// This is the wire shape of a column in an import request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub source_header: Option<String>,
}

impl ColumnRequest {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            source_header: None,
        }
    }

    /// Pull values for this column from the given source header.
    pub fn from_source(mut self, header: impl Into<String>) -> Self {
        self.source_header = Some(header.into());
        self
    }
}

/// A validated destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    /// Header to take values from; `None` means the column is always `NULL`.
    pub source_header: Option<String>,
}

/// A validated import target: table name plus ordered destination columns.
///
/// Only [`crate::schema::plan`] constructs plans, so names are always legal identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPlan {
    pub(crate) table_name: String,
    pub(crate) columns: Vec<ColumnSpec>,
}

impl ImportPlan {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }
}

/// One row the store refused to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowInsertFailure {
    /// 1-based data row index (the header is not counted).
    pub row_index: usize,
    pub kind: String,
    pub message: String,
}

/// Result of a completed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub table_name: String,
    pub inserted_count: usize,
    pub failed_count: usize,
    pub failures: Vec<RowInsertFailure>,
    pub message: String,
}

impl ImportOutcome {
    pub(crate) fn new(table_name: &str, inserted_count: usize, failures: Vec<RowInsertFailure>) -> Self {
        let failed_count = failures.len();
        let mut message = format!("table {table_name} created with {inserted_count} rows imported");
        if failed_count > 0 {
            message.push_str(&format!(", {failed_count} rows failed to import"));
        }
        Self {
            table_name: table_name.to_owned(),
            inserted_count,
            failed_count,
            failures,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoded_table_pads_and_truncates_rows() {
        let header = Header::new(vec!["a".into(), "b".into()]);
        let table = DecodedTable::new(
            header,
            vec![
                vec![CellValue::from("1")],
                vec!["1".into(), "2".into(), "3".into()],
            ],
        );
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0], vec![CellValue::from("1"), CellValue::Null]);
        assert_eq!(table.rows()[1].len(), 2);
    }

    #[test]
    fn column_type_parse_is_exact() {
        assert_eq!("INTEGER".parse::<ColumnType>(), Ok(ColumnType::Integer));
        assert_eq!("NULL".parse::<ColumnType>(), Ok(ColumnType::Null));
        assert!("integer".parse::<ColumnType>().is_err());
        assert!("VARCHAR".parse::<ColumnType>().is_err());
    }

    #[test]
    fn outcome_message_mentions_failures_only_when_present() {
        let ok = ImportOutcome::new("people", 2, Vec::new());
        assert_eq!(ok.message, "table people created with 2 rows imported");

        let partial = ImportOutcome::new(
            "people",
            1,
            vec![RowInsertFailure {
                row_index: 2,
                kind: "constraint_violation".into(),
                message: "boom".into(),
            }],
        );
        assert_eq!(partial.failed_count, 1);
        assert!(partial.message.ends_with(", 1 rows failed to import"));
    }

    #[test]
    fn column_request_deserializes_wire_shape() {
        let req: ColumnRequest =
            serde_json::from_str(r#"{"name":"full_name","type":"TEXT","sourceHeader":"Name"}"#).unwrap();
        assert_eq!(req, ColumnRequest::new("full_name", "TEXT").from_source("Name"));

        let unmapped: ColumnRequest = serde_json::from_str(r#"{"name":"notes","type":"TEXT"}"#).unwrap();
        assert_eq!(unmapped.source_header, None);
    }

    #[test]
    fn cell_values_serialize_untagged() {
        let row = vec![CellValue::Null, CellValue::Integer(3), CellValue::from("x")];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[null,3,"x"]"#);
    }
}
