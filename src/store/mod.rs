//! Destination store abstraction.
//!
//! The loader talks to the store only through [`TableStore`], so callers pass an explicit
//! handle (one per request, or a shared one behind their own lock) instead of relying on a
//! process-wide connection. [`SqliteStore`] is the production implementation.

mod sqlite;

pub use sqlite::{ColumnInfo, SqliteStore};

use crate::error::StoreResult;
use crate::types::{CellValue, ColumnSpec};

/// Operations the loader needs from a relational store.
///
/// Table and column names handed to these methods have already passed
/// [`crate::schema::is_valid_identifier`]. Values are always passed separately from statement
/// text.
pub trait TableStore {
    /// Names of all user tables.
    fn table_names(&self) -> StoreResult<Vec<String>>;

    fn table_exists(&self, name: &str) -> StoreResult<bool>;

    /// Create `name` with `columns` in order.
    fn create_table(&mut self, name: &str, columns: &[ColumnSpec]) -> StoreResult<()>;

    /// Prepare the row insert for `name` with `column_count` values per row.
    ///
    /// Called once after [`Self::create_table`] and before the first [`Self::insert_row`].
    fn prepare_insert(&mut self, name: &str, column_count: usize) -> StoreResult<()>;

    fn insert_row(&mut self, name: &str, values: &[CellValue]) -> StoreResult<()>;

    /// Drop `name` if it exists.
    fn drop_table(&mut self, name: &str) -> StoreResult<()>;

    /// Start a unit of work. A failed row insert must not end it.
    fn begin(&mut self) -> StoreResult<()>;

    fn commit(&mut self) -> StoreResult<()>;

    fn rollback(&mut self) -> StoreResult<()>;
}

/// Quote a validated identifier for use in statement text.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
