//! Delimited-text decoding.

use crate::error::{DecodeError, DecodeResult};
use crate::types::{CellValue, DecodedTable, Header};

use super::encoding::{normalize_text, TextEncoding};

/// Decode delimited text into a [`DecodedTable`].
///
/// Rules:
///
/// - Bytes are normalized to UTF-8 first (see [`normalize_text`]).
/// - The first record is the header; it must have at least one non-blank name.
/// - Every data cell is [`CellValue::Text`]; short records are padded with `Null` and surplus
///   fields are dropped.
pub fn decode_delimited(bytes: &[u8], encoding: TextEncoding, delimiter: u8) -> DecodeResult<DecodedTable> {
    let (text, applied) = normalize_text(bytes, encoding)?;
    tracing::debug!(encoding = applied.name(), bytes = bytes.len(), "normalized delimited text");

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    decode_delimited_from_reader(&mut rdr)
}

/// Decode from an existing CSV reader (already UTF-8).
pub fn decode_delimited_from_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> DecodeResult<DecodedTable> {
    let header = Header::new(rdr.headers()?.iter().map(str::to_owned).collect());
    if header.is_blank() {
        return Err(DecodeError::EmptyHeader {
            message: "delimited text does not contain any column names".to_string(),
        });
    }

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(CellValue::from).collect());
    }

    Ok(DecodedTable::new(header, rows))
}
