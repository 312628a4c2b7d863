//! Error types for yggdrasil
//!
//! # Error Categories
//!
//! - **ImportExportError**: GEDCOM and backup operations that abort as a whole
//! - **StorageError** (in [`crate::storage`]): blob store failures
//!
//! Per-record problems are not errors. Importers collect them into
//! [`crate::services::SkippedRecord`] lists and backup operations into warning
//! strings, so one bad record never aborts a pass.

pub mod import_export;

pub use import_export::ImportExportError;

/// Result type alias for import/export operations
pub type ImportExportResult<T> = Result<T, ImportExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_export_result_alias() {
        let result: ImportExportResult<()> = Err(ImportExportError::EmptyDocument);
        assert!(result.is_err());
    }
}
