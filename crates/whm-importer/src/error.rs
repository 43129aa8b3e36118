//! Error taxonomy of the importer
//!
//! Every failure maps to one [`ErrorKind`]. Per-object failures
//! (`invalid_*`, `decode_error`) become block errors and send the object to
//! the invalid archive. Transport failures are retried and then abort the
//! sweep.

use std::fmt;
use thiserror::Error;
use whm_common::{RetryError, Retryable};

use crate::catalog::CatalogError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, ImportError>;

/// Stable classification used in logs and block errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    InvalidKey,
    InvalidFilename,
    InvalidOperation,
    Decode,
    Io,
    Publish,
    CatalogUnavailable,
    SchemaConflict,
    TableNotFound,
    CommitRejected,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "config_error",
            ErrorKind::InvalidKey => "invalid_key",
            ErrorKind::InvalidFilename => "invalid_filename",
            ErrorKind::InvalidOperation => "invalid_operation",
            ErrorKind::Decode => "decode_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Publish => "publish_error",
            ErrorKind::CatalogUnavailable => "catalog_unavailable",
            ErrorKind::SchemaConflict => "schema_conflict",
            ErrorKind::TableNotFound => "table_not_found",
            ErrorKind::CommitRejected => "commit_rejected",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid key {key:?}: expected <root>/<socCod>/<boType>/<file>")]
    InvalidKey { key: String },

    #[error("invalid file name {file_name:?}: expected <timestamp>_<boCod>_<op>.xml")]
    InvalidFilename { file_name: String },

    #[error("invalid operation {op:?} in {file_name:?}")]
    InvalidOperation { file_name: String, op: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(String),

    /// The source object vanished between listing and loading
    #[error("source object not found: {0}")]
    SourceMissing(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("commit rejected: {0}")]
    CommitRejected(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::Config(_) => ErrorKind::Config,
            ImportError::InvalidKey { .. } => ErrorKind::InvalidKey,
            ImportError::InvalidFilename { .. } => ErrorKind::InvalidFilename,
            ImportError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            ImportError::Decode(_) => ErrorKind::Decode,
            ImportError::Io(_) | ImportError::SourceMissing(_) => ErrorKind::Io,
            ImportError::Publish(_) => ErrorKind::Publish,
            ImportError::CatalogUnavailable(_) => ErrorKind::CatalogUnavailable,
            ImportError::SchemaConflict(_) => ErrorKind::SchemaConflict,
            ImportError::TableNotFound(_) => ErrorKind::TableNotFound,
            ImportError::CommitRejected(_) => ErrorKind::CommitRejected,
            ImportError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ImportError::Io(_)
                | ImportError::Publish(_)
                | ImportError::CatalogUnavailable(_)
                | ImportError::CommitRejected(_)
        )
    }
}

impl Retryable for ImportError {
    fn is_retryable(&self) -> bool {
        ImportError::is_retryable(self)
    }
}

impl From<RetryError<ImportError>> for ImportError {
    fn from(err: RetryError<ImportError>) -> Self {
        match err {
            RetryError::Cancelled => ImportError::Cancelled,
            RetryError::Failed(e) => e,
        }
    }
}

impl From<StorageError> for ImportError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ImportError::SourceMissing(key),
            other => ImportError::Io(other.to_string()),
        }
    }
}

impl From<CatalogError> for ImportError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unavailable(msg) => ImportError::CatalogUnavailable(msg),
            CatalogError::SchemaConflict(msg) => ImportError::SchemaConflict(msg),
            CatalogError::CommitRejected(msg) => ImportError::CommitRejected(msg),
            CatalogError::TableNotFound(table) => ImportError::TableNotFound(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::InvalidFilename.to_string(), "invalid_filename");
        assert_eq!(ImportError::Decode("x".into()).kind().as_str(), "decode_error");
        assert_eq!(ImportError::SourceMissing("k".into()).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_retry_disposition() {
        assert!(ImportError::Io("reset".into()).is_retryable());
        assert!(ImportError::Publish("throttled".into()).is_retryable());
        assert!(ImportError::CommitRejected("race".into()).is_retryable());
        assert!(!ImportError::SchemaConflict("bad".into()).is_retryable());
        assert!(!ImportError::SourceMissing("gone".into()).is_retryable());
        assert!(!ImportError::Cancelled.is_retryable());
    }

    #[test]
    fn test_storage_not_found_maps_to_source_missing() {
        let err: ImportError = StorageError::NotFound("a/b.xml".into()).into();
        assert!(matches!(err, ImportError::SourceMissing(k) if k == "a/b.xml"));
    }

    #[test]
    fn test_missing_table_has_its_own_kind() {
        let err: ImportError = CatalogError::TableNotFound("whm.mgt".into()).into();
        assert_eq!(err.kind().as_str(), "table_not_found");
        assert!(!err.is_retryable());
    }
}
