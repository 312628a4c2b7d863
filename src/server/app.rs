use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use anyhow::{anyhow, Result};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{backup, gedcom, health, operations, places};
use crate::app_context::AppContext;

/// Uploads and backup archives carry whole family trees plus media.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub app: AppContext,
}

pub fn create_app(app: AppContext, cors_origin: Option<&str>) -> Result<Router> {
    let state = AppState { app };

    let cors = match cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .map_err(|e| anyhow!("Invalid CORS origin {}: {}", origin, e))?,
            )
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state);

    Ok(app)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(gedcom::upload_gedcom))
        .route("/export-gedcom", get(gedcom::export_gedcom))
        .route("/backup/export", get(backup::export_backup))
        .route("/backup/import", post(backup::import_backup))
        .route("/places/sync", post(places::sync_places))
        .route("/places/stats", get(places::place_stats))
        .route("/operations/status", get(operations::operation_status))
}
