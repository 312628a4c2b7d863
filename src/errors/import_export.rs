//! Import and export error types
//!
//! Errors raised by the GEDCOM importer/exporter and the backup engine.
//! Only failures that abort a whole operation live here; a single bad record,
//! an unresolvable pointer or a missing media blob is reported through the
//! operation summary instead.
//!
//! # Examples
//!
//! ```rust
//! use yggdrasil::errors::ImportExportError;
//!
//! let err = ImportExportError::InvalidArchive("missing manifest.json".to_string());
//! assert!(err.is_client_error());
//! assert_eq!(err.error_code(), "INVALID_ARCHIVE");
//! ```

use thiserror::Error;

use crate::storage::StorageError;

/// Import and export operation errors
#[derive(Error, Debug)]
pub enum ImportExportError {
    /// Backup archive is unusable (no manifest, unreadable zip, missing data file)
    #[error("Invalid backup file: {0}")]
    InvalidArchive(String),

    /// GEDCOM input yielded no parseable top-level records
    #[error("GEDCOM file contains no parseable top-level records")]
    EmptyDocument,

    /// Another import or restore is already running
    #[error("Operation already in progress: {0}")]
    OperationInProgress(String),

    /// Archive data could not be decoded
    #[error("Failed to parse {path}: {source}")]
    MalformedData {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Zip container error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Blob store failure that could not be downgraded to a warning
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The background task running the operation panicked or was aborted
    #[error("Operation task failed: {0}")]
    TaskFailed(String),
}

impl ImportExportError {
    /// Errors caused by the caller's input (400-series)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImportExportError::InvalidArchive(_)
                | ImportExportError::EmptyDocument
                | ImportExportError::MalformedData { .. }
        )
    }

    /// A concurrent operation rejected this one (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, ImportExportError::OperationInProgress(_))
    }

    /// Everything else (500-series)
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error() && !self.is_conflict()
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ImportExportError::InvalidArchive(_) => "INVALID_ARCHIVE",
            ImportExportError::EmptyDocument => "EMPTY_DOCUMENT",
            ImportExportError::OperationInProgress(_) => "OPERATION_IN_PROGRESS",
            ImportExportError::MalformedData { .. } => "MALFORMED_DATA",
            ImportExportError::Serialization(_) => "SERIALIZATION_ERROR",
            ImportExportError::Archive(_) => "ARCHIVE_ERROR",
            ImportExportError::Storage(_) => "STORAGE_ERROR",
            ImportExportError::Io(_) => "IO_ERROR",
            ImportExportError::Database(_) => "DATABASE_ERROR",
            ImportExportError::TaskFailed(_) => "TASK_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_input_is_client_error() {
        assert!(ImportExportError::EmptyDocument.is_client_error());
        assert!(ImportExportError::InvalidArchive("missing manifest.json".into()).is_client_error());
        assert!(!ImportExportError::EmptyDocument.is_server_error());
    }

    #[test]
    fn test_operation_in_progress_is_conflict() {
        let err = ImportExportError::OperationInProgress("backup restore".into());
        assert!(err.is_conflict());
        assert!(!err.is_client_error());
        assert_eq!(err.error_code(), "OPERATION_IN_PROGRESS");
    }

    #[test]
    fn test_database_error_is_server_error() {
        let err = ImportExportError::Database(sea_orm::DbErr::Custom("boom".into()));
        assert!(err.is_server_error());
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_error_display() {
        let err = ImportExportError::InvalidArchive("missing manifest.json".into());
        assert_eq!(err.to_string(), "Invalid backup file: missing manifest.json");
    }
}
