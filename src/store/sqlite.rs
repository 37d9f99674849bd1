use std::path::Path;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::StoreResult;
use crate::types::{CellValue, ColumnSpec, ColumnType};

use super::{quote_ident, TableStore};

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(SqlValue::Null),
            CellValue::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            CellValue::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn cell_from_sql(v: ValueRef<'_>) -> CellValue {
    match v {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Real(f),
        ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
        // Blobs have no cell representation; render as lowercase hex.
        ValueRef::Blob(b) => CellValue::Text(b.iter().map(|byte| format!("{byte:02x}")).collect()),
    }
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// SQLite-backed [`TableStore`].
pub struct SqliteStore {
    conn: Connection,
    strict_tables: bool,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self::from_connection(conn))
    }

    /// Private in-memory database, useful for tests and dry runs.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap a connection whose lifecycle is managed elsewhere.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            strict_tables: false,
        }
    }

    /// Create `STRICT` tables, so SQLite rejects values that cannot be stored in the declared
    /// type instead of silently keeping them. `NULL` columns are declared `ANY` in this mode.
    pub fn with_strict_tables(mut self, strict: bool) -> Self {
        self.strict_tables = strict;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    pub fn sqlite_version(&self) -> StoreResult<String> {
        Ok(self.conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?)
    }

    /// Column layout of `name`; empty if the table does not exist.
    pub fn table_info(&self, name: &str) -> StoreResult<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare("SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)")?;
        let rows = stmt.query_map([name], |row| {
            Ok(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                declared_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default_value: row.get(4)?,
                primary_key: row.get::<_, i64>(5)? != 0,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn row_count(&self, name: &str) -> StoreResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(name));
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Read up to `limit` rows starting at `offset`, in rowid order.
    pub fn read_rows(&self, name: &str, limit: usize, offset: usize) -> StoreResult<Vec<Vec<CellValue>>> {
        let sql = format!("SELECT * FROM {} ORDER BY rowid LIMIT ?1 OFFSET ?2", quote_ident(name));
        let mut stmt = self.conn.prepare(&sql)?;
        let width = stmt.column_count();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit, offset], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(cell_from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// SQLite reads a trailing `NULL` as a column constraint, not a type, so a `NULL` column is
    /// declared without a type (`ANY` in strict tables). Both give no type affinity.
    fn column_type_sql(&self, t: ColumnType) -> Option<&'static str> {
        match (t, self.strict_tables) {
            (ColumnType::Null, true) => Some("ANY"),
            (ColumnType::Null, false) => None,
            (t, _) => Some(t.as_sql()),
        }
    }

    fn insert_sql(name: &str, column_count: usize) -> String {
        let placeholders = vec!["?"; column_count].join(", ");
        format!("INSERT INTO {} VALUES ({placeholders})", quote_ident(name))
    }
}

impl TableStore for SqliteStore {
    fn table_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")?;
        let names = stmt.query_map([], |row| row.get(0))?;
        Ok(names.collect::<Result<Vec<String>, _>>()?)
    }

    fn table_exists(&self, name: &str) -> StoreResult<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn create_table(&mut self, name: &str, columns: &[ColumnSpec]) -> StoreResult<()> {
        let defs = columns
            .iter()
            .map(|c| match self.column_type_sql(c.column_type) {
                Some(ty) => format!("{} {ty}", quote_ident(&c.name)),
                None => quote_ident(&c.name),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let strict = if self.strict_tables { " STRICT" } else { "" };
        let sql = format!("CREATE TABLE {} ({defs}){strict}", quote_ident(name));
        tracing::debug!(%sql, "creating table");
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn prepare_insert(&mut self, name: &str, column_count: usize) -> StoreResult<()> {
        self.conn.prepare_cached(&Self::insert_sql(name, column_count))?;
        Ok(())
    }

    fn insert_row(&mut self, name: &str, values: &[CellValue]) -> StoreResult<()> {
        let mut stmt = self.conn.prepare_cached(&Self::insert_sql(name, values.len()))?;
        stmt.execute(params_from_iter(values.iter()))?;
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> StoreResult<()> {
        self.conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])?;
        Ok(())
    }

    fn begin(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, column_type: ColumnType) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            column_type,
            source_header: None,
        }
    }

    #[test]
    fn create_insert_and_read_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .create_table("people", &[spec("name", ColumnType::Text), spec("age", ColumnType::Integer)])
            .unwrap();
        store.prepare_insert("people", 2).unwrap();
        store
            .insert_row("people", &[CellValue::from("Ada"), CellValue::from("36")])
            .unwrap();

        assert!(store.table_exists("people").unwrap());
        assert_eq!(store.table_names().unwrap(), vec!["people".to_string()]);
        assert_eq!(store.row_count("people").unwrap(), 1);
        // INTEGER affinity converts numeric text.
        assert_eq!(
            store.read_rows("people", 10, 0).unwrap(),
            vec![vec![CellValue::from("Ada"), CellValue::Integer(36)]]
        );
    }

    #[test]
    fn table_info_reports_declared_types() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .create_table("t", &[spec("a", ColumnType::Real), spec("b", ColumnType::Null)])
            .unwrap();
        let info = store.table_info("t").unwrap();
        let types: Vec<_> = info.iter().map(|c| c.declared_type.as_str()).collect();
        assert_eq!(types, vec!["REAL", ""]);
        assert!(store.table_info("missing").unwrap().is_empty());
    }

    #[test]
    fn null_columns_accept_any_value() {
        for strict in [false, true] {
            let mut store = SqliteStore::open_in_memory().unwrap().with_strict_tables(strict);
            store.create_table("t", &[spec("x", ColumnType::Null)]).unwrap();
            let declared = if strict { "ANY" } else { "" };
            assert_eq!(store.table_info("t").unwrap()[0].declared_type, declared);

            store.insert_row("t", &[CellValue::from("007")]).unwrap();
            store.insert_row("t", &[CellValue::Integer(7)]).unwrap();
            assert_eq!(
                store.read_rows("t", 10, 0).unwrap(),
                vec![vec![CellValue::from("007")], vec![CellValue::Integer(7)]]
            );
        }
    }

    #[test]
    fn keyword_and_numeric_identifiers_are_quoted() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .create_table("2024", &[spec("order", ColumnType::Text), spec("select", ColumnType::Text)])
            .unwrap();
        store.prepare_insert("2024", 2).unwrap();
        store.insert_row("2024", &[CellValue::from("a"), CellValue::Null]).unwrap();
        assert_eq!(store.row_count("2024").unwrap(), 1);
    }

    #[test]
    fn strict_tables_reject_mismatched_values() {
        let mut store = SqliteStore::open_in_memory().unwrap().with_strict_tables(true);
        store
            .create_table("t", &[spec("n", ColumnType::Integer), spec("x", ColumnType::Null)])
            .unwrap();
        store.insert_row("t", &[CellValue::from("12"), CellValue::from("anything")]).unwrap();

        let err = store
            .insert_row("t", &[CellValue::from("twelve"), CellValue::Null])
            .unwrap_err();
        assert_eq!(err.kind(), "constraint_violation");
    }

    #[test]
    fn rollback_discards_created_table() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.begin().unwrap();
        store.create_table("t", &[spec("a", ColumnType::Text)]).unwrap();
        store.rollback().unwrap();
        assert!(!store.table_exists("t").unwrap());
        // Rolling back outside a transaction is a no-op.
        store.rollback().unwrap();
    }

    #[test]
    fn sqlite_version_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.sqlite_version().unwrap().starts_with('3'));
    }
}
