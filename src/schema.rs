//! Validation of a proposed destination table.
//!
//! Table and column names end up in SQL statement positions that cannot be bound as parameters,
//! so they must match [`is_valid_identifier`] before any statement is built from them.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{SchemaError, SchemaResult};
use crate::types::{ColumnRequest, ColumnSpec, ColumnType, ImportPlan};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// True if `name` is a legal table/column identifier (`^[A-Za-z0-9_]+$`).
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Validate a table name and column list against the existing tables of the store.
///
/// Rules are checked in this order and the first violation is returned:
///
/// 1. table name is a legal identifier
/// 2. every column name is a legal identifier
/// 3. every column type is one of `TEXT`, `INTEGER`, `REAL`, `BLOB`, `NULL`
/// 4. no table with that name exists
///
/// An empty column list is rejected last.
///
/// ```
/// use tabular_ingest::schema::plan;
/// use tabular_ingest::types::ColumnRequest;
/// use tabular_ingest::SchemaError;
///
/// let err = plan("bad name", &[ColumnRequest::new("ok_col", "TEXT")], &["orders"]).unwrap_err();
/// assert!(matches!(err, SchemaError::InvalidTableName { .. }));
/// ```
pub fn plan<S: AsRef<str>>(
    table_name: &str,
    columns: &[ColumnRequest],
    existing_table_names: &[S],
) -> SchemaResult<ImportPlan> {
    if !is_valid_identifier(table_name) {
        return Err(SchemaError::InvalidTableName {
            name: table_name.to_owned(),
        });
    }

    if let Some(col) = columns.iter().find(|c| !is_valid_identifier(&c.name)) {
        return Err(SchemaError::InvalidColumnName { name: col.name.clone() });
    }

    let mut specs = Vec::with_capacity(columns.len());
    for col in columns {
        let column_type = col
            .column_type
            .parse::<ColumnType>()
            .map_err(|()| SchemaError::InvalidColumnType {
                column: col.name.clone(),
                column_type: col.column_type.clone(),
            })?;
        specs.push(ColumnSpec {
            name: col.name.clone(),
            column_type,
            source_header: col.source_header.clone().filter(|h| !h.is_empty()),
        });
    }

    if existing_table_names.iter().any(|t| t.as_ref() == table_name) {
        return Err(SchemaError::TableAlreadyExists {
            name: table_name.to_owned(),
        });
    }

    if specs.is_empty() {
        return Err(SchemaError::NoColumns {
            table: table_name.to_owned(),
        });
    }

    Ok(ImportPlan {
        table_name: table_name.to_owned(),
        columns: specs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn identifier_rule() {
        assert!(is_valid_identifier("orders_2024"));
        assert!(is_valid_identifier("_x"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("bad name"));
        assert!(!is_valid_identifier("drop;table"));
        assert!(!is_valid_identifier("名前"));
    }

    #[test]
    fn valid_plan_keeps_column_order_and_mapping() {
        let plan = plan(
            "people",
            &[
                ColumnRequest::new("full_name", "TEXT").from_source("Name"),
                ColumnRequest::new("age", "INTEGER").from_source("Age"),
                ColumnRequest::new("notes", "TEXT"),
            ],
            &["orders"],
        )
        .unwrap();

        assert_eq!(plan.table_name(), "people");
        let names: Vec<_> = plan.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["full_name", "age", "notes"]);
        assert_eq!(plan.columns()[1].column_type, ColumnType::Integer);
        assert_eq!(plan.columns()[2].source_header, None);
    }

    #[test]
    fn empty_source_header_means_unmapped() {
        let mut col = ColumnRequest::new("notes", "TEXT");
        col.source_header = Some(String::new());
        let plan = plan("t", &[col], &NONE).unwrap();
        assert_eq!(plan.columns()[0].source_header, None);
    }

    #[test]
    fn invalid_table_name_wins_over_everything() {
        let err = plan(
            "bad name",
            &[ColumnRequest::new("bad col", "VARCHAR")],
            &["bad name"],
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::InvalidTableName { name: "bad name".into() });
    }

    #[test]
    fn invalid_column_name_wins_over_type_and_existence() {
        let err = plan(
            "people",
            &[
                ColumnRequest::new("ok", "VARCHAR"),
                ColumnRequest::new("bad-col", "TEXT"),
            ],
            &["people"],
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::InvalidColumnName { name: "bad-col".into() });
    }

    #[test]
    fn invalid_type_wins_over_existence() {
        let err = plan("people", &[ColumnRequest::new("ok", "text")], &["people"]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidColumnType {
                column: "ok".into(),
                column_type: "text".into()
            }
        );
    }

    #[test]
    fn existing_table_is_rejected() {
        let err = plan("people", &[ColumnRequest::new("ok", "TEXT")], &["people"]).unwrap_err();
        assert_eq!(err.kind(), "table_already_exists");
    }

    #[test]
    fn empty_column_list_is_rejected() {
        let err = plan("people", &[], &NONE).unwrap_err();
        assert_eq!(err, SchemaError::NoColumns { table: "people".into() });
    }
}
