use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, ImportError};
use crate::types::{ContainerKind, ImportOutcome};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal, e.g. rows rejected during a load).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

/// Context about a decode attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// File the bytes came from, when decoding from a path.
    pub source: Option<PathBuf>,
    /// Container kind used for decoding.
    pub kind: ContainerKind,
}

impl IngestionContext {
    fn source_label(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// Stats reported on successful decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Number of data rows (header excluded).
    pub rows: usize,
    /// Number of header columns.
    pub columns: usize,
}

/// Observer interface for decode and load outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when decoding succeeds.
    fn on_decoded(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when decoding fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &DecodeError) {}

    /// Called when a decode failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DecodeError) {
        self.on_failure(ctx, severity, error)
    }

    /// Called when a load completes (possibly with rejected rows).
    fn on_loaded(&self, _outcome: &ImportOutcome) {}

    /// Called when an import into `table` fails at any stage.
    fn on_import_failure(&self, _table: &str, _severity: IngestionSeverity, _error: &ImportError) {}

    /// Called when an import failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_import_failure`].
    fn on_import_alert(&self, table: &str, severity: IngestionSeverity, error: &ImportError) {
        self.on_import_failure(table, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_decoded(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_decoded(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DecodeError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DecodeError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }

    fn on_loaded(&self, outcome: &ImportOutcome) {
        for o in &self.observers {
            o.on_loaded(outcome);
        }
    }

    fn on_import_failure(&self, table: &str, severity: IngestionSeverity, error: &ImportError) {
        for o in &self.observers {
            o.on_import_failure(table, severity, error);
        }
    }

    fn on_import_alert(&self, table: &str, severity: IngestionSeverity, error: &ImportError) {
        for o in &self.observers {
            o.on_import_alert(table, severity, error);
        }
    }
}

/// Emits events through `tracing` under the `tabular_ingest::events` target.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_decoded(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            target: "tabular_ingest::events",
            kind = ?ctx.kind,
            source = %ctx.source_label(),
            rows = stats.rows,
            columns = stats.columns,
            "decode ok"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DecodeError) {
        tracing::error!(
            target: "tabular_ingest::events",
            ?severity,
            kind = ?ctx.kind,
            source = %ctx.source_label(),
            error = %error,
            "decode failed"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DecodeError) {
        tracing::error!(
            target: "tabular_ingest::events",
            alert = true,
            ?severity,
            kind = ?ctx.kind,
            source = %ctx.source_label(),
            error = %error,
            "decode failed"
        );
    }

    fn on_loaded(&self, outcome: &ImportOutcome) {
        if outcome.failed_count > 0 {
            tracing::warn!(
                target: "tabular_ingest::events",
                table = %outcome.table_name,
                inserted = outcome.inserted_count,
                failed = outcome.failed_count,
                "load finished with rejected rows"
            );
        } else {
            tracing::info!(
                target: "tabular_ingest::events",
                table = %outcome.table_name,
                inserted = outcome.inserted_count,
                "load ok"
            );
        }
    }

    fn on_import_failure(&self, table: &str, severity: IngestionSeverity, error: &ImportError) {
        tracing::error!(
            target: "tabular_ingest::events",
            ?severity,
            table,
            kind = error.kind(),
            error = %error,
            "import failed"
        );
    }

    fn on_import_alert(&self, table: &str, severity: IngestionSeverity, error: &ImportError) {
        tracing::error!(
            target: "tabular_ingest::events",
            alert = true,
            ?severity,
            table,
            kind = error.kind(),
            error = %error,
            "import failed"
        );
    }
}

/// Appends events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_decoded(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "{} decoded kind={:?} source={} rows={} columns={}",
            unix_ts(),
            ctx.kind,
            ctx.source_label(),
            stats.rows,
            stats.columns
        ));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DecodeError) {
        self.append_line(&format!(
            "{} fail severity={:?} kind={:?} source={} err={}",
            unix_ts(),
            severity,
            ctx.kind,
            ctx.source_label(),
            error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DecodeError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} kind={:?} source={} err={}",
            unix_ts(),
            severity,
            ctx.kind,
            ctx.source_label(),
            error
        ));
    }

    fn on_loaded(&self, outcome: &ImportOutcome) {
        self.append_line(&format!(
            "{} loaded table={} inserted={} failed={}",
            unix_ts(),
            outcome.table_name,
            outcome.inserted_count,
            outcome.failed_count
        ));
    }

    fn on_import_failure(&self, table: &str, severity: IngestionSeverity, error: &ImportError) {
        self.append_line(&format!(
            "{} import fail severity={:?} table={} kind={} err={}",
            unix_ts(),
            severity,
            table,
            error.kind(),
            error
        ));
    }

    fn on_import_alert(&self, table: &str, severity: IngestionSeverity, error: &ImportError) {
        self.append_line(&format!(
            "{} import ALERT severity={:?} table={} kind={} err={}",
            unix_ts(),
            severity,
            table,
            error.kind(),
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
