#![cfg(feature = "excel_test_writer")]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_xlsxwriter::Workbook;
use tabular_ingest::pipeline::{import_upload, preview_upload, ImportOptions, ImportRequest, UploadedFile};
use tabular_ingest::store::{SqliteStore, TableStore};
use tabular_ingest::types::{CellValue, ColumnRequest};
use tabular_ingest::{ImportError, LoadError};

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("tabular-ingest-{name}-{nanos}.xlsx"))
}

fn write_people_xlsx(path: &PathBuf, with_rows: bool) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();

    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    ws.write_string(0, 2, "score").unwrap();
    ws.write_string(0, 3, "active").unwrap();

    if with_rows {
        ws.write_number(1, 0, 1).unwrap();
        ws.write_string(1, 1, "Ada").unwrap();
        ws.write_number(1, 2, 98.5).unwrap();
        ws.write_boolean(1, 3, true).unwrap();

        ws.write_number(2, 0, 2).unwrap();
        ws.write_string(2, 1, "Grace").unwrap();
        ws.write_boolean(2, 3, false).unwrap();
    }

    wb.save(path).unwrap();
}

fn people_request() -> ImportRequest {
    ImportRequest {
        table_name: "people".to_string(),
        columns: vec![
            ColumnRequest::new("id", "INTEGER").from_source("id"),
            ColumnRequest::new("name", "TEXT").from_source("name"),
            ColumnRequest::new("score", "REAL").from_source("score"),
            ColumnRequest::new("active", "INTEGER").from_source("active"),
        ],
    }
}

#[test]
fn workbook_rows_land_in_typed_columns() {
    let path = tmp_file("import");
    write_people_xlsx(&path, true);
    let mut store = SqliteStore::open_in_memory().unwrap().with_strict_tables(true);

    let outcome = import_upload(&mut store, UploadedFile::new(&path), &people_request(), &ImportOptions::default())
        .unwrap();

    assert_eq!(outcome.inserted_count, 2);
    assert_eq!(outcome.failed_count, 0);
    assert_eq!(
        store.read_rows("people", 10, 0).unwrap(),
        vec![
            vec![CellValue::Integer(1), CellValue::from("Ada"), CellValue::Real(98.5), CellValue::Integer(1)],
            vec![CellValue::Integer(2), CellValue::from("Grace"), CellValue::Null, CellValue::Integer(0)],
        ]
    );
    assert!(!path.exists());
}

#[test]
fn header_only_workbook_is_insufficient_data() {
    let path = tmp_file("header-only");
    write_people_xlsx(&path, false);
    let mut store = SqliteStore::open_in_memory().unwrap();

    let err = import_upload(&mut store, UploadedFile::new(&path), &people_request(), &ImportOptions::default())
        .unwrap_err();

    assert!(matches!(err, ImportError::Load(LoadError::InsufficientData)));
    assert!(!store.table_exists("people").unwrap());
    assert!(!path.exists());
}

#[test]
fn workbook_preview_is_a_prefix_of_the_import() {
    let path = tmp_file("preview");
    write_people_xlsx(&path, true);
    let opts = ImportOptions {
        preview_rows: 1,
        retain_upload_after_preview: true,
        ..Default::default()
    };

    let shown = preview_upload(UploadedFile::new(&path), &opts).unwrap();
    assert_eq!(shown.preview.total_rows, 2);

    let mut store = SqliteStore::open_in_memory().unwrap();
    import_upload(&mut store, UploadedFile::new(&path), &people_request(), &opts).unwrap();

    let previewed: Vec<_> = shown.preview.sample_rows.iter().map(|r| r.values()).collect();
    assert_eq!(store.read_rows("people", 1, 0).unwrap(), previewed);
    assert!(!path.exists());
}
