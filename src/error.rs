use thiserror::Error;

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for schema planning.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for the upload orchestration layer.
pub type ImportResult<T> = Result<T, ImportError>;

const MALFORMED_CONTAINER_HINT: &str = "make sure the file is a real .xlsx/.xls workbook and not another format \
     (for example a CSV file) with a renamed extension";

/// Failure while turning raw bytes into a [`crate::types::DecodedTable`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The header record has no columns, or every header cell is blank.
    #[error("empty header: {message}")]
    EmptyHeader { message: String },

    /// The workbook container could not be opened.
    #[error("malformed container: {message}")]
    MalformedContainer { message: String },

    /// Delimited text could not be decoded in the selected encoding.
    #[error("input is not valid {encoding} text")]
    Encoding { encoding: &'static str },

    /// CSV tokenizer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Underlying I/O error when decoding from a path.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The container kind could not be determined or is not compiled in.
    #[error("unsupported format: {message}")]
    UnsupportedFormat { message: String },
}

impl DecodeError {
    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyHeader { .. } => "empty_header",
            Self::MalformedContainer { .. } => "malformed_container",
            Self::Encoding { .. } => "encoding_error",
            Self::Csv(_) => "csv_error",
            Self::Io(_) => "io_error",
            Self::UnsupportedFormat { .. } => "unsupported_format",
        }
    }

    /// Remediation hint for the caller, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MalformedContainer { .. } => Some(MALFORMED_CONTAINER_HINT),
            _ => None,
        }
    }
}

/// Rejection of a proposed table/column layout.
///
/// Variants are listed in the order the planner checks them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid table name '{name}': only letters, digits and underscores are allowed")]
    InvalidTableName { name: String },

    #[error("invalid column name '{name}': only letters, digits and underscores are allowed")]
    InvalidColumnName { name: String },

    #[error("invalid type '{column_type}' for column '{column}'")]
    InvalidColumnType { column: String, column_type: String },

    #[error("table '{name}' already exists")]
    TableAlreadyExists { name: String },

    #[error("no columns were specified for table '{table}'")]
    NoColumns { table: String },
}

impl SchemaError {
    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTableName { .. } => "invalid_table_name",
            Self::InvalidColumnName { .. } => "invalid_column_name",
            Self::InvalidColumnType { .. } => "invalid_column_type",
            Self::TableAlreadyExists { .. } => "table_already_exists",
            Self::NoColumns { .. } => "no_columns",
        }
    }
}

/// Fatal failure of a load. Per-row insert failures are not errors; they are
/// accumulated in [`crate::types::ImportOutcome`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("insufficient data: the file has a header but no data rows")]
    InsufficientData,

    #[error("column '{column}' maps to unknown source header '{header}'")]
    UnknownSourceHeader { column: String, header: String },

    #[error("failed to create table '{table}': {source}")]
    TableCreation {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("transaction failed for table '{table}': {source}")]
    Transaction {
        table: String,
        #[source]
        source: StoreError,
    },
}

impl LoadError {
    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientData => "insufficient_data",
            Self::UnknownSourceHeader { .. } => "unknown_source_header",
            Self::TableCreation { .. } => "table_creation_error",
            Self::Transaction { .. } => "transaction_error",
        }
    }
}

/// Error reported by a [`crate::store::TableStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The store refused the operation for a reason of its own.
    #[error("{kind}: {message}")]
    Rejected { kind: &'static str, message: String },
}

impl StoreError {
    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sqlite(err) => match err.sqlite_error_code() {
                Some(rusqlite::ErrorCode::ConstraintViolation) => "constraint_violation",
                Some(rusqlite::ErrorCode::TypeMismatch) => "type_mismatch",
                Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                    "store_busy"
                }
                _ => "store_error",
            },
            Self::Rejected { kind, .. } => *kind,
        }
    }
}

/// Error returned by the upload orchestration layer.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("the uploaded file is empty")]
    EmptyFile,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyFile => "empty_file",
            Self::Decode(e) => e.kind(),
            Self::Schema(e) => e.kind(),
            Self::Load(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }

    /// Remediation hint for the caller, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Decode(e) => e.hint(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_container_carries_hint() {
        let err = ImportError::from(DecodeError::MalformedContainer {
            message: "invalid zip header".to_string(),
        });
        assert_eq!(err.kind(), "malformed_container");
        assert!(err.hint().unwrap().contains("renamed extension"));
    }

    #[test]
    fn schema_errors_have_no_hint() {
        let err = ImportError::from(SchemaError::TableAlreadyExists {
            name: "people".to_string(),
        });
        assert_eq!(err.kind(), "table_already_exists");
        assert!(err.hint().is_none());
        assert_eq!(err.to_string(), "table 'people' already exists");
    }

    #[test]
    fn rejected_store_error_reports_its_kind() {
        let err = StoreError::Rejected {
            kind: "constraint_violation",
            message: "NOT NULL constraint failed".to_string(),
        };
        assert_eq!(err.kind(), "constraint_violation");
    }
}
