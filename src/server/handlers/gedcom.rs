use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json},
};
use serde::Deserialize;

use super::{attachment, ApiResult};
use crate::app_context::GedcomUploadReport;
use crate::server::app::AppState;
use crate::services::GedcomImportOptions;

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
    #[serde(default)]
    pub replace: bool,
}

/// Raw GEDCOM bytes in the request body.
pub async fn upload_gedcom(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<Json<GedcomUploadReport>> {
    let options = GedcomImportOptions {
        replace_existing: params.replace,
    };
    let report = state
        .app
        .import_gedcom(params.filename.as_deref(), &body, options)
        .await?;
    Ok(Json(report))
}

pub async fn export_gedcom(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let file = state.app.export_gedcom().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&file.filename)),
        ],
        file.content,
    ))
}
