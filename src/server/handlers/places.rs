use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use super::ApiResult;
use crate::server::app::AppState;
use crate::services::PlaceStats;

pub async fn sync_places(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let added = state.app.sync_places().await?;
    Ok(Json(json!({ "added": added })))
}

pub async fn place_stats(State(state): State<AppState>) -> ApiResult<Json<PlaceStats>> {
    Ok(Json(state.app.place_stats().await?))
}
