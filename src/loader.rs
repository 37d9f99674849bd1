//! Table creation and bulk row insertion.
//!
//! A load runs as one unit of work on the caller's store handle:
//!
//! ```text
//! Validated -> TableCreating -> TableCreated -> RowLoading -> Completed
//!                            \-> TableCreateFailed -> Aborted
//! ```
//!
//! Rows the store rejects are recorded in [`ImportOutcome::failures`] and never abort the batch.
//! Once table creation has started the load is not cancellable.

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult, StoreError};
use crate::store::TableStore;
use crate::types::{CellValue, ColumnSpec, DecodedTable, Header, ImportOutcome, ImportPlan, RowInsertFailure};

/// What to do when the decoded file has a header but no data rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyDataPolicy {
    /// Fail with [`LoadError::InsufficientData`] before touching the store.
    #[default]
    Reject,
    /// Create the table and report zero imported rows.
    CreateEmptyTable,
}

/// Options controlling a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub empty_data_policy: EmptyDataPolicy,
}

/// Create `plan`'s table in `store` and insert every row of `table`.
///
/// Before any mutation this checks that each mapped source header exists in `table` and applies
/// the [`EmptyDataPolicy`]. Creation and insertion then run inside one store transaction:
///
/// - table creation failure rolls back and returns [`LoadError::TableCreation`]
/// - insert preparation failure drops the new table (best effort), rolls back and returns
///   [`LoadError::TableCreation`]
/// - a rejected row is logged with its 1-based index and counted; loading continues
pub fn load<S: TableStore + ?Sized>(
    store: &mut S,
    plan: &ImportPlan,
    table: &DecodedTable,
    options: &LoadOptions,
) -> LoadResult<ImportOutcome> {
    let table_name = plan.table_name();
    let projection = project_columns(plan.columns(), table.header())?;

    if table.row_count() == 0 && options.empty_data_policy == EmptyDataPolicy::Reject {
        return Err(LoadError::InsufficientData);
    }

    store.begin().map_err(|source| LoadError::Transaction {
        table: table_name.to_owned(),
        source,
    })?;

    if let Err(source) = create_table_checked(store, plan) {
        rollback_quietly(store, table_name);
        return Err(LoadError::TableCreation {
            table: table_name.to_owned(),
            source,
        });
    }

    if let Err(source) = store.prepare_insert(table_name, plan.columns().len()) {
        if let Err(drop_err) = store.drop_table(table_name) {
            tracing::error!(table = table_name, error = %drop_err, "failed to drop table after insert preparation failed");
        }
        rollback_quietly(store, table_name);
        return Err(LoadError::TableCreation {
            table: table_name.to_owned(),
            source,
        });
    }
    tracing::info!(table = table_name, rows = table.row_count(), "table created, loading rows");

    let mut inserted = 0usize;
    let mut failures = Vec::new();
    for (idx0, row) in table.rows().iter().enumerate() {
        let row_index = idx0 + 1;
        let values = build_row(&projection, row);
        match store.insert_row(table_name, &values) {
            Ok(()) => inserted += 1,
            Err(e) => {
                tracing::warn!(table = table_name, row = row_index, error = %e, "failed to insert row");
                failures.push(RowInsertFailure {
                    row_index,
                    kind: e.kind().to_owned(),
                    message: e.to_string(),
                });
            }
        }
    }

    if let Err(source) = store.commit() {
        rollback_quietly(store, table_name);
        return Err(LoadError::Transaction {
            table: table_name.to_owned(),
            source,
        });
    }

    let outcome = ImportOutcome::new(table_name, inserted, failures);
    tracing::info!(
        table = table_name,
        inserted = outcome.inserted_count,
        failed = outcome.failed_count,
        "load complete"
    );
    Ok(outcome)
}

/// Source column position for each destination column (`None` = always null).
fn project_columns(columns: &[ColumnSpec], header: &Header) -> LoadResult<Vec<Option<usize>>> {
    columns
        .iter()
        .map(|col| match &col.source_header {
            None => Ok(None),
            Some(h) => header.position(h).map(Some).ok_or_else(|| LoadError::UnknownSourceHeader {
                column: col.name.clone(),
                header: h.clone(),
            }),
        })
        .collect()
}

fn build_row(projection: &[Option<usize>], row: &[CellValue]) -> Vec<CellValue> {
    projection
        .iter()
        .map(|src| match src.and_then(|i| row.get(i)) {
            Some(cell) => cell.normalized(),
            None => CellValue::Null,
        })
        .collect()
}

fn create_table_checked<S: TableStore + ?Sized>(store: &mut S, plan: &ImportPlan) -> Result<(), StoreError> {
    // The plan was checked against a table list taken earlier; re-check inside the transaction.
    if store.table_exists(plan.table_name())? {
        return Err(StoreError::Rejected {
            kind: "table_already_exists",
            message: format!("table '{}' already exists", plan.table_name()),
        });
    }
    store.create_table(plan.table_name(), plan.columns())
}

fn rollback_quietly<S: TableStore + ?Sized>(store: &mut S, table_name: &str) {
    if let Err(e) = store.rollback() {
        tracing::error!(table = table_name, error = %e, "rollback failed");
    }
}
