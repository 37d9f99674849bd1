//! Upload-level orchestration: preview an uploaded file, or import it into a new table.
//!
//! Uploaded files are temporary. [`UploadedFile`] owns the path and deletes the file when it is
//! dropped, so every exit path (decode failure, preview, import success or failure) cleans up
//! exactly once. [`UploadedFile::keep`] opts out, e.g. to preview now and import later.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, ImportError, ImportResult, LoadError};
use crate::ingestion::unified::severity_for_error;
use crate::ingestion::{decode_path, infer_kind_from_path, DecodeOptions, IngestionObserver, IngestionSeverity};
use crate::loader::{load, LoadOptions};
use crate::preview::{preview, Preview, DEFAULT_PREVIEW_ROWS};
use crate::schema::plan;
use crate::store::TableStore;
use crate::types::{ColumnRequest, ContainerKind, DecodedTable, ImportOutcome};

/// A temporary file handed over by the upload layer.
#[derive(Debug)]
pub struct UploadedFile {
    path: PathBuf,
    kind: Option<ContainerKind>,
    delete_on_drop: bool,
}

impl UploadedFile {
    /// Take ownership of a temporary upload; it is deleted when this value is dropped.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
            delete_on_drop: true,
        }
    }

    /// Override extension-based kind detection (useful when the temp name lost its extension).
    pub fn with_kind(mut self, kind: ContainerKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the file without deleting it and return its path.
    pub fn keep(mut self) -> PathBuf {
        self.delete_on_drop = false;
        std::mem::take(&mut self.path)
    }

    /// Kind set on the upload, else the configured `fallback`, else inferred from the extension.
    fn container_kind(&self, fallback: Option<ContainerKind>) -> ImportResult<ContainerKind> {
        match self.kind.or(fallback) {
            Some(k) => Ok(k),
            None => Ok(infer_kind_from_path(&self.path)?),
        }
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        if !self.delete_on_drop {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed temporary upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(path = %self.path.display(), error = %e, "failed to remove temporary upload"),
        }
    }
}

/// Caller's import choices: target table and destination columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub table_name: String,
    pub columns: Vec<ColumnRequest>,
}

/// Orchestration options.
///
/// Use [`Default`] for common cases; the plain-data parts deserialize from config.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub decode: DecodeOptions,
    pub load: LoadOptions,
    /// Number of sample rows in a preview.
    pub preview_rows: usize,
    /// Keep the upload after a successful preview so it can be imported later.
    pub retain_upload_after_preview: bool,
    /// Observer notified of completed loads (decode events go through `decode.observer`).
    #[serde(skip)]
    pub observer: Option<Arc<dyn IngestionObserver>>,
}

impl fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("decode", &self.decode)
            .field("load", &self.load)
            .field("preview_rows", &self.preview_rows)
            .field("retain_upload_after_preview", &self.retain_upload_after_preview)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            decode: DecodeOptions::default(),
            load: LoadOptions::default(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            retain_upload_after_preview: false,
            observer: None,
        }
    }
}

impl ImportOptions {
    /// Parse the plain-data options from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Preview of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPreview {
    #[serde(flatten)]
    pub preview: Preview,
    /// Where the upload was kept, when `retain_upload_after_preview` is set.
    pub retained_path: Option<PathBuf>,
}

/// Decode and preview an upload.
pub fn preview_upload(upload: UploadedFile, options: &ImportOptions) -> ImportResult<UploadPreview> {
    let table = decode_upload(&upload, &options.decode)?;
    let preview = preview(&table, options.preview_rows);

    let retained_path = options.retain_upload_after_preview.then(|| upload.keep());
    Ok(UploadPreview { preview, retained_path })
}

/// Decode an upload, validate the request against `store`, and load it.
///
/// The upload is deleted whatever the result. The outcome, or the failure with its severity, is
/// reported to `options.observer`; failures at or above `options.decode.alert_at_or_above` also
/// raise an import alert.
pub fn import_upload<S: TableStore + ?Sized>(
    store: &mut S,
    upload: UploadedFile,
    request: &ImportRequest,
    options: &ImportOptions,
) -> ImportResult<ImportOutcome> {
    let result = run_import(store, upload, request, options);

    if let Err(e) = &result {
        tracing::warn!(table = %request.table_name, kind = e.kind(), error = %e, "import failed");
    }
    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(outcome) => obs.on_loaded(outcome),
            Err(e) => {
                let sev = severity_for_import_error(e);
                obs.on_import_failure(&request.table_name, sev, e);
                if sev >= options.decode.alert_at_or_above {
                    obs.on_import_alert(&request.table_name, sev, e);
                }
            }
        }
    }
    result
}

fn run_import<S: TableStore + ?Sized>(
    store: &mut S,
    upload: UploadedFile,
    request: &ImportRequest,
    options: &ImportOptions,
) -> ImportResult<ImportOutcome> {
    let table = decode_upload(&upload, &options.decode)?;
    drop(upload);

    let existing = store.table_names()?;
    let plan = plan(&request.table_name, &request.columns, &existing)?;
    Ok(load(store, &plan, &table, &options.load)?)
}

/// Store and transaction failures are infrastructure problems; everything else is a rejected
/// request or file.
fn severity_for_import_error(e: &ImportError) -> IngestionSeverity {
    match e {
        ImportError::Decode(e) => severity_for_error(e),
        ImportError::Store(_) | ImportError::Load(LoadError::Transaction { .. }) => IngestionSeverity::Critical,
        ImportError::EmptyFile | ImportError::Schema(_) | ImportError::Load(_) => IngestionSeverity::Error,
    }
}

fn decode_upload(upload: &UploadedFile, decode: &DecodeOptions) -> ImportResult<DecodedTable> {
    let len = std::fs::metadata(upload.path())
        .map_err(DecodeError::from)?
        .len();
    if len == 0 {
        return Err(ImportError::EmptyFile);
    }

    let options = DecodeOptions {
        container: Some(upload.container_kind(decode.container)?),
        ..decode.clone()
    };
    Ok(decode_path(upload.path(), &options)?)
}
