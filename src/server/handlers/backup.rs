use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Json},
};
use tracing::warn;

use super::{attachment, ApiResult};
use crate::server::app::AppState;
use crate::services::BackupRestoreSummary;

pub async fn export_backup(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let archive = state.app.export_backup().await?;
    for warning in &archive.warnings {
        warn!("Backup export: {}", warning);
    }
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&archive.filename)),
        ],
        archive.bytes,
    ))
}

/// Zip archive in the request body.
pub async fn import_backup(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<BackupRestoreSummary>> {
    let summary = state.app.import_backup(&body).await?;
    Ok(Json(summary))
}
