//! Unified decoding entrypoint.
//!
//! Most callers should use [`decode`] (bytes already in memory) or [`decode_path`] (a file on
//! disk, kind inferred from its extension unless [`DecodeOptions::container`] is set).
//!
//! If an [`IngestionObserver`] is configured on [`DecodeOptions`], success/failure/alerts are
//! reported to it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeResult};
use crate::types::{ContainerKind, DecodedTable};

use super::encoding::TextEncoding;
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};

/// Options controlling decoding.
///
/// Use [`Default`] for common cases. The plain-data part deserializes from config with every
/// field optional.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// If `None`, [`decode_path`] infers the kind from the file extension.
    pub container: Option<ContainerKind>,
    /// Encoding hint for delimited text.
    pub encoding: TextEncoding,
    /// Field delimiter for delimited text. If `None`, [`decode_path`] uses a tab for `.tsv`
    /// files and a comma otherwise; [`decode`] uses a comma.
    pub delimiter: Option<u8>,
    /// Optional observer for logging/alerts.
    #[serde(skip)]
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("container", &self.container)
            .field("encoding", &self.encoding)
            .field("delimiter", &self.delimiter.map(char::from))
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            container: None,
            encoding: TextEncoding::Auto,
            delimiter: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Decode in-memory bytes of a known container kind.
///
/// ```
/// use tabular_ingest::ingestion::{decode, DecodeOptions};
/// use tabular_ingest::types::{CellValue, ContainerKind};
///
/// # fn main() -> Result<(), tabular_ingest::DecodeError> {
/// let table = decode(b"Name,City\nAlice,Paris\n", ContainerKind::DelimitedText, &DecodeOptions::default())?;
/// assert_eq!(table.row_count(), 1);
/// assert_eq!(table.cell(0, "City"), Some(&CellValue::from("Paris")));
/// # Ok(())
/// # }
/// ```
pub fn decode(bytes: &[u8], kind: ContainerKind, options: &DecodeOptions) -> DecodeResult<DecodedTable> {
    let ctx = IngestionContext { source: None, kind };
    let delimiter = options.delimiter.unwrap_or(DEFAULT_DELIMITER);
    let result = decode_dispatch(bytes, kind, options.encoding, delimiter);
    report(&ctx, options, &result);
    result
}

/// Read and decode a file.
///
/// The file is only read; deleting it is the caller's job.
pub fn decode_path(path: impl AsRef<Path>, options: &DecodeOptions) -> DecodeResult<DecodedTable> {
    let path = path.as_ref();
    let kind = match options.container {
        Some(k) => k,
        None => infer_kind_from_path(path)?,
    };
    let delimiter = options.delimiter.unwrap_or_else(|| delimiter_for_path(path));
    let ctx = IngestionContext {
        source: Some(path.to_path_buf()),
        kind,
    };

    let result = std::fs::read(path)
        .map_err(DecodeError::from)
        .and_then(|bytes| decode_dispatch(&bytes, kind, options.encoding, delimiter));
    report(&ctx, options, &result);
    result
}

const DEFAULT_DELIMITER: u8 = b',';

fn delimiter_for_path(path: &Path) -> u8 {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => DEFAULT_DELIMITER,
    }
}

fn decode_dispatch(
    bytes: &[u8],
    kind: ContainerKind,
    encoding: TextEncoding,
    delimiter: u8,
) -> DecodeResult<DecodedTable> {
    match kind {
        ContainerKind::DelimitedText => super::csv::decode_delimited(bytes, encoding, delimiter),
        ContainerKind::Spreadsheet => decode_workbook_dispatch(bytes),
    }
}

fn decode_workbook_dispatch(bytes: &[u8]) -> DecodeResult<DecodedTable> {
    #[cfg(feature = "excel")]
    {
        super::excel::decode_workbook(bytes)
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = bytes;
        Err(DecodeError::UnsupportedFormat {
            message: "spreadsheet decoding not enabled (enable cargo feature 'excel')".to_string(),
        })
    }
}

fn report(ctx: &IngestionContext, options: &DecodeOptions, result: &DecodeResult<DecodedTable>) {
    match result {
        Ok(table) => tracing::info!(kind = ?ctx.kind, rows = table.row_count(), columns = table.header().len(), "decoded file"),
        Err(e) => tracing::warn!(kind = ?ctx.kind, error = %e, "failed to decode file"),
    }

    let Some(obs) = options.observer.as_ref() else {
        return;
    };
    match result {
        Ok(table) => obs.on_decoded(
            ctx,
            IngestionStats {
                rows: table.row_count(),
                columns: table.header().len(),
            },
        ),
        Err(e) => {
            let sev = severity_for_error(e);
            obs.on_failure(ctx, sev, e);
            if sev >= options.alert_at_or_above {
                obs.on_alert(ctx, sev, e);
            }
        }
    }
}

pub(crate) fn severity_for_error(e: &DecodeError) -> IngestionSeverity {
    match e {
        DecodeError::Io(_) => IngestionSeverity::Critical,
        DecodeError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        DecodeError::EmptyHeader { .. }
        | DecodeError::MalformedContainer { .. }
        | DecodeError::Encoding { .. }
        | DecodeError::UnsupportedFormat { .. } => IngestionSeverity::Error,
    }
}

/// Infer the container kind from a path's extension.
pub fn infer_kind_from_path(path: &Path) -> DecodeResult<ContainerKind> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| DecodeError::UnsupportedFormat {
            message: format!("cannot infer format: path has no extension ({})", path.display()),
        })?;

    ContainerKind::from_extension(ext).ok_or_else(|| DecodeError::UnsupportedFormat {
        message: format!("cannot infer format from extension '{ext}' for path ({})", path.display()),
    })
}
