use axum::{extract::State, response::Json};

use crate::server::app::AppState;
use crate::services::OperationStatus;

pub async fn operation_status(State(state): State<AppState>) -> Json<OperationStatus> {
    Json(state.app.operation_status())
}
