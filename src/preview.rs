//! Bounded preview of a decoded file.
//!
//! A caller shows the preview to a user, who then picks the table name, destination columns and
//! the source header (if any) for each column.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::types::{CellValue, DecodedTable};

/// Number of sample rows returned when the caller does not ask for a specific count.
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// One sample row keyed by header name, in header order.
///
/// Serializes as a JSON object. With duplicate header names every entry is kept positionally;
/// [`PreviewRow::get`] returns the first.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow {
    cells: Vec<(String, CellValue)>,
}

impl PreviewRow {
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(h, _)| h == header).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Values in header order.
    pub fn values(&self) -> Vec<CellValue> {
        self.cells.iter().map(|(_, v)| v.clone()).collect()
    }
}

impl Serialize for PreviewRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (h, v) in &self.cells {
            map.serialize_entry(h, v)?;
        }
        map.end()
    }
}

/// Preview of a decoded file.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub header: Vec<String>,
    pub sample_rows: Vec<PreviewRow>,
    pub total_rows: usize,
}

/// Take the first `min(max_rows, total_rows)` rows of `table`.
pub fn preview(table: &DecodedTable, max_rows: usize) -> Preview {
    let header: Vec<String> = table.header().names().map(str::to_owned).collect();
    let sample_rows = table
        .rows()
        .iter()
        .take(max_rows)
        .map(|row| PreviewRow {
            cells: header.iter().cloned().zip(row.iter().cloned()).collect(),
        })
        .collect();

    Preview {
        header,
        sample_rows,
        total_rows: table.row_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Header;

    fn table_of_n(n: usize) -> DecodedTable {
        let header = Header::new(vec!["id".into(), "name".into()]);
        let rows = (0..n)
            .map(|i| vec![CellValue::Integer(i as i64), CellValue::Text(format!("row{i}"))])
            .collect();
        DecodedTable::new(header, rows)
    }

    #[test]
    fn sample_is_capped_at_max_rows() {
        let p = preview(&table_of_n(25), DEFAULT_PREVIEW_ROWS);
        assert_eq!(p.total_rows, 25);
        assert_eq!(p.sample_rows.len(), 10);
        assert_eq!(p.sample_rows[9].get("id"), Some(&CellValue::Integer(9)));
    }

    #[test]
    fn short_tables_are_previewed_whole() {
        let p = preview(&table_of_n(3), DEFAULT_PREVIEW_ROWS);
        assert_eq!(p.sample_rows.len(), 3);

        let empty = preview(&table_of_n(0), DEFAULT_PREVIEW_ROWS);
        assert_eq!(empty.header, vec!["id", "name"]);
        assert!(empty.sample_rows.is_empty());
    }

    #[test]
    fn rows_serialize_as_header_keyed_objects() {
        let p = preview(&table_of_n(1), 5);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "header": ["id", "name"],
                "sampleRows": [{"id": 0, "name": "row0"}],
                "totalRows": 1
            })
        );
    }
}
