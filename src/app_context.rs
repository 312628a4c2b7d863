use std::sync::Arc;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::errors::{ImportExportError, ImportExportResult};
use crate::services::{
    BackupArchiveFile, BackupRestoreSummary, BackupService, GedcomImportOptions,
    GedcomImportSummary, GedcomService, OperationKind, OperationStatus, OperationTracker,
    PlaceService, PlaceStats,
};
use crate::storage::BlobStore;

/// Result of [`AppContext::import_gedcom`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GedcomUploadReport {
    #[serde(flatten)]
    pub summary: GedcomImportSummary,
    /// Object name of the archived upload in the GEDCOM bucket.
    pub stored_as: Option<String>,
    pub warnings: Vec<String>,
}

/// A rendered GEDCOM document ready for download.
#[derive(Debug, Clone)]
pub struct GedcomExportFile {
    pub filename: String,
    pub content: String,
}

/// Shared application context used by the HTTP layer and the CLI.
#[derive(Clone)]
pub struct AppContext {
    db: DatabaseConnection,
    blob_store: Arc<dyn BlobStore>,
    operations: OperationTracker,
    gedcom_service: Arc<GedcomService>,
    backup_service: Arc<BackupService>,
    place_service: Arc<PlaceService>,
    gedcom_bucket: String,
}

impl AppContext {
    pub fn new(db: DatabaseConnection, blob_store: Arc<dyn BlobStore>, config: &AppConfig) -> Self {
        let gedcom_service = Arc::new(GedcomService::new(db.clone()));
        let backup_service = Arc::new(BackupService::new(
            db.clone(),
            blob_store.clone(),
            config.media_bucket.clone(),
        ));
        let place_service = Arc::new(PlaceService::new(db.clone()));

        Self {
            db,
            blob_store,
            operations: OperationTracker::new(),
            gedcom_service,
            backup_service,
            place_service,
            gedcom_bucket: config.gedcom_bucket.clone(),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn blob_store(&self) -> Arc<dyn BlobStore> {
        self.blob_store.clone()
    }

    /// Keep a copy of the upload, then import it. Rejected while another
    /// import or restore is running.
    ///
    /// The work runs on its own task, so it completes even if the caller
    /// stops waiting for it.
    pub async fn import_gedcom(
        &self,
        original_filename: Option<&str>,
        bytes: &[u8],
        options: GedcomImportOptions,
    ) -> ImportExportResult<GedcomUploadReport> {
        let permit = self.operations.try_begin(OperationKind::GedcomImport)?;

        let blob_store = self.blob_store.clone();
        let gedcom_service = self.gedcom_service.clone();
        let bucket = self.gedcom_bucket.clone();
        let object_name = upload_object_name(original_filename);
        let bytes = bytes.to_vec();

        let task = tokio::spawn(async move {
            let mut warnings = Vec::new();
            let stored_as = match blob_store.put(&bucket, &object_name, bytes.clone()).await {
                Ok(()) => {
                    info!("Stored upload as {}/{}", bucket, object_name);
                    Some(object_name)
                }
                Err(e) => {
                    warn!("Could not store GEDCOM upload: {}", e);
                    warnings.push(format!("Could not store GEDCOM upload: {}", e));
                    None
                }
            };

            let result = gedcom_service
                .import_gedcom(&bytes, options)
                .await
                .map(|summary| GedcomUploadReport {
                    summary,
                    stored_as,
                    warnings,
                });
            permit.finish_with(result)
        });
        join_operation(task).await
    }

    pub async fn export_gedcom(&self) -> ImportExportResult<GedcomExportFile> {
        let content = self.gedcom_service.export_gedcom().await?;
        Ok(GedcomExportFile {
            filename: format!(
                "yggdrasil_export_{}.ged",
                Utc::now().format("%Y%m%d_%H%M%S")
            ),
            content,
        })
    }

    pub async fn export_backup(&self) -> ImportExportResult<BackupArchiveFile> {
        self.backup_service.export_backup().await
    }

    /// Replace the graph with a backup archive. Rejected while another
    /// import or restore is running.
    pub async fn import_backup(&self, archive: &[u8]) -> ImportExportResult<BackupRestoreSummary> {
        let permit = self.operations.try_begin(OperationKind::BackupRestore)?;
        let backup_service = self.backup_service.clone();
        let archive = archive.to_vec();

        let task = tokio::spawn(async move {
            let result = backup_service.import_backup(&archive).await;
            permit.finish_with(result)
        });
        join_operation(task).await
    }

    pub fn operation_status(&self) -> OperationStatus {
        self.operations.status()
    }

    /// The shared import/restore slot.
    pub fn operations(&self) -> &OperationTracker {
        &self.operations
    }

    pub async fn sync_places(&self) -> ImportExportResult<usize> {
        Ok(self.place_service.sync_places_from_events().await?)
    }

    pub async fn place_stats(&self) -> ImportExportResult<PlaceStats> {
        Ok(self.place_service.stats().await?)
    }
}

async fn join_operation<T>(task: JoinHandle<ImportExportResult<T>>) -> ImportExportResult<T> {
    task.await.map_err(|e| {
        error!("Operation task failed: {}", e);
        ImportExportError::TaskFailed(e.to_string())
    })?
}

/// `<timestamp>_<name>` with the name reduced to a safe file name.
fn upload_object_name(original_filename: Option<&str>) -> String {
    let name: String = original_filename
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .unwrap_or("upload.ged")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_start_matches('.');
    let name = if name.is_empty() { "upload.ged" } else { name };
    format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S_%f"), name)
}
