//! Decoding entrypoints and implementations.
//!
//! Most callers should use [`decode`] or [`decode_path`] (from [`unified`]) which:
//!
//! - dispatch on the [`crate::types::ContainerKind`] (or infer it from the file extension)
//! - produce a positional [`crate::types::DecodedTable`]
//! - optionally report success/failure/alerts to an [`IngestionObserver`]
//!
//! Format-specific functions are also available under:
//! - [`csv`] (with [`encoding`] normalization)
//! - `excel` (feature `excel`)

pub mod csv;
pub mod encoding;
#[cfg(feature = "excel")]
pub mod excel;
pub mod observability;
pub mod unified;

pub use encoding::TextEncoding;
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    TracingObserver,
};
pub use unified::{decode, decode_path, infer_kind_from_path, DecodeOptions};
