pub mod app;
pub mod handlers;

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use sea_orm_migration::prelude::*;
use tracing::info;

use crate::app_context::AppContext;
use crate::config::AppConfig;
use crate::database::{connection::*, migrations::Migrator};
use crate::storage::FilesystemBlobStore;

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

pub async fn start_server(config: &AppConfig) -> Result<()> {
    let database_url = get_database_url(Some(&config.database_path));
    let db = establish_connection(&database_url).await?;

    Migrator::up(&db, None).await?;
    info!("Database migrations completed");

    let blob_store = Arc::new(FilesystemBlobStore::new(config.storage_root.clone()));
    let context = AppContext::new(db, blob_store, config);
    let app = app::create_app(context, config.cors_origin.as_deref())?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server running on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  GET  /health                 - Health check");
    info!("  POST /api/upload             - Import a GEDCOM file");
    info!("  GET  /api/export-gedcom      - Download the tree as GEDCOM");
    info!("  GET  /api/backup/export      - Download a full backup");
    info!("  POST /api/backup/import      - Restore a backup (replaces everything)");
    info!("  POST /api/places/sync        - Create places from event places");
    info!("  GET  /api/places/stats       - Place geocoding counts");
    info!("  GET  /api/operations/status  - Running and last finished operation");
}

pub async fn migrate_database(database_path: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
