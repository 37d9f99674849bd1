//! `tabular-ingest` imports spreadsheet and delimited-text files into new SQLite tables.
//!
//! The flow has four stages, each producing a new value from the previous one:
//!
//! 1. **Decode** ([`ingestion::decode`]): bytes of a [`types::ContainerKind`] into a
//!    [`types::DecodedTable`] (positional header plus rows of [`types::CellValue`]s).
//! 2. **Preview** ([`preview::preview`]): the first rows, keyed by header, plus the total row count.
//! 3. **Plan** ([`schema::plan`]): validate table name, column names and declared column types
//!    against the store's existing tables.
//! 4. **Load** ([`loader::load`]): create the table and insert every row inside one transaction,
//!    counting (not aborting on) rows the store rejects.
//!
//! [`pipeline`] wires these together for uploaded temporary files and guarantees the file is
//! removed on every exit path.
//!
//! ## What you can decode
//!
//! - **Delimited text**: `.csv`, `.tsv`, `.txt`. UTF-8 (with or without BOM), UTF-16 with BOM,
//!   and GBK are detected automatically; see [`ingestion::TextEncoding`].
//! - **Workbooks** (Cargo feature `excel`, on by default): `.xlsx`, `.xlsm`, `.xlsb`, `.xls`,
//!   `.ods`. The first sheet is read and its first row is the header.
//!
//! ## Example: decode, plan and load
//!
//! ```rust
//! use tabular_ingest::ingestion::{decode, DecodeOptions};
//! use tabular_ingest::loader::{load, LoadOptions};
//! use tabular_ingest::schema::plan;
//! use tabular_ingest::store::{SqliteStore, TableStore};
//! use tabular_ingest::types::{CellValue, ColumnRequest, ContainerKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let csv = b"Name,City\nAlice,Paris\nBob,Lyon\n";
//! let table = decode(csv, ContainerKind::DelimitedText, &DecodeOptions::default())?;
//!
//! let mut store = SqliteStore::open_in_memory()?;
//! let plan = plan(
//!     "people",
//!     &[
//!         ColumnRequest::new("name", "TEXT").from_source("Name"),
//!         ColumnRequest::new("notes", "TEXT"),
//!     ],
//!     &store.table_names()?,
//! )?;
//!
//! let outcome = load(&mut store, &plan, &table, &LoadOptions::default())?;
//! assert_eq!(outcome.inserted_count, 2);
//! assert_eq!(
//!     store.read_rows("people", 10, 0)?,
//!     vec![
//!         vec![CellValue::from("Alice"), CellValue::Null],
//!         vec![CellValue::from("Bob"), CellValue::Null],
//!     ]
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: decoding entrypoints, encoding detection, observers
//! - [`preview`]: bounded previews
//! - [`schema`]: table/column validation
//! - [`loader`]: transactional table creation and row loading
//! - [`store`]: the [`store::TableStore`] seam and its SQLite implementation
//! - [`pipeline`]: upload orchestration and temporary-file lifecycle
//! - [`execution`]: background decoding on a worker pool
//! - [`types`], [`error`]: data model and error types

pub mod error;
pub mod execution;
pub mod ingestion;
pub mod loader;
pub mod pipeline;
pub mod preview;
pub mod schema;
pub mod store;
pub mod types;

pub use error::{DecodeError, ImportError, LoadError, SchemaError, StoreError};
