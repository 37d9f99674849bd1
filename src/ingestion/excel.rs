#![cfg(feature = "excel")]

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Range, Reader};

use crate::error::{DecodeError, DecodeResult};
use crate::types::{CellValue, DecodedTable, Header};

/// Decode a workbook (`.xlsx`, `.xls`, `.ods`, etc.) held in memory.
///
/// Behavior:
/// - Reads the first sheet only
/// - The first physical row is the header; if it is blank (or the sheet is empty) decoding
///   fails with [`DecodeError::EmptyHeader`]
/// - A workbook with a header and no data rows decodes to zero rows
/// - Bytes that no workbook reader accepts fail with [`DecodeError::MalformedContainer`]
pub fn decode_workbook(bytes: &[u8]) -> DecodeResult<DecodedTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        DecodeError::MalformedContainer {
            message: e.to_string(),
        }
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(DecodeError::MalformedContainer {
                message: e.to_string(),
            });
        }
        None => {
            return Err(DecodeError::EmptyHeader {
                message: "workbook has no sheets".to_string(),
            });
        }
    };

    decode_sheet_range(&range)
}

fn decode_sheet_range(range: &Range<Data>) -> DecodeResult<DecodedTable> {
    // `Range` starts at the first used cell; a later start row means row 1 is blank.
    match range.start() {
        Some((0, _)) => {}
        Some((row, _)) => {
            return Err(DecodeError::EmptyHeader {
                message: format!("first row of the sheet is empty (data starts at row {})", row + 1),
            });
        }
        None => {
            return Err(DecodeError::EmptyHeader {
                message: "sheet does not contain any data".to_string(),
            });
        }
    }

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(cells) => Header::new(cells.iter().map(cell_to_header_string).collect()),
        None => Header::default(),
    };
    if header.is_blank() {
        return Err(DecodeError::EmptyHeader {
            message: "first row of the sheet is empty".to_string(),
        });
    }

    let body = rows.map(|cells| cells.iter().map(convert_cell).collect()).collect();
    Ok(DecodedTable::new(header, body))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => match convert_cell(other) {
            CellValue::Text(s) => s,
            CellValue::Integer(i) => i.to_string(),
            CellValue::Real(f) => f.to_string(),
            CellValue::Null => String::new(),
        },
    }
}

fn convert_cell(c: &Data) -> CellValue {
    match c {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                CellValue::Integer(*f as i64)
            } else {
                CellValue::Real(*f)
            }
        }
        Data::Bool(b) => CellValue::Integer(i64::from(*b)),
        Data::DateTime(dt) => CellValue::Text(render_datetime(dt)),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => {
            tracing::debug!(error = ?e, "spreadsheet error cell decoded as null");
            CellValue::Null
        }
    }
}

/// ISO-8601 text for a date/time cell: `YYYY-MM-DD` for whole days, `HH:MM:SS` for a time of
/// day, `YYYY-MM-DDTHH:MM:SS` otherwise. Durations render as `H:MM:SS` and may exceed 24 hours.
fn render_datetime(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        return render_duration(dt.as_f64());
    }
    let (y, mo, d, h, mi, s, ms) = dt.to_ymd_hms_milli();
    let time = if ms > 0 {
        format!("{h:02}:{mi:02}:{s:02}.{ms:03}")
    } else {
        format!("{h:02}:{mi:02}:{s:02}")
    };
    if dt.as_f64() < 1.0 {
        time
    } else if (h, mi, s, ms) == (0, 0, 0, 0) {
        format!("{y:04}-{mo:02}-{d:02}")
    } else {
        format!("{y:04}-{mo:02}-{d:02}T{time}")
    }
}

fn render_duration(days: f64) -> String {
    let total_ms = (days.abs() * 86_400_000.0).round() as u64;
    let sign = if days < 0.0 { "-" } else { "" };
    let (secs, ms) = (total_ms / 1000, total_ms % 1000);
    let (h, mi, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if ms > 0 {
        format!("{sign}{h}:{mi:02}:{s:02}.{ms:03}")
    } else {
        format!("{sign}{h}:{mi:02}:{s:02}")
    }
}
