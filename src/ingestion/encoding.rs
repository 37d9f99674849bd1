//! Character-encoding normalization for delimited text.
//!
//! Legacy exports from East-Asian spreadsheet tools are commonly GBK-encoded. Instead of
//! reinterpreting every file as GBK (which garbles input that is already UTF-8), the bytes are
//! sniffed first and only reinterpreted when they are not valid UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, GBK, UTF_8};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeResult};

/// Encoding hint for delimited-text input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// Byte-order mark, then UTF-8 validity, then GBK.
    #[default]
    Auto,
    /// Strict UTF-8 (a leading BOM is allowed and stripped).
    Utf8,
    /// Strict GBK.
    Gbk,
}

/// Decode `bytes` into UTF-8 text according to `hint`.
///
/// Returns the text together with the encoding that was applied.
pub fn normalize_text(bytes: &[u8], hint: TextEncoding) -> DecodeResult<(Cow<'_, str>, &'static Encoding)> {
    match hint {
        TextEncoding::Auto => {
            if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
                return decode_strict(encoding, &bytes[bom_len..]).map(|text| (text, encoding));
            }
            if let Ok(text) = std::str::from_utf8(bytes) {
                return Ok((Cow::Borrowed(text), UTF_8));
            }
            decode_strict(GBK, bytes).map(|text| (text, GBK))
        }
        TextEncoding::Utf8 => {
            let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            decode_strict(UTF_8, body).map(|text| (text, UTF_8))
        }
        TextEncoding::Gbk => decode_strict(GBK, bytes).map(|text| (text, GBK)),
    }
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> DecodeResult<Cow<'a, str>> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or(DecodeError::Encoding {
            encoding: encoding.name(),
        })
}
