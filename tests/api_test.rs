//! HTTP API integration tests

mod common;

use anyhow::Result;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;
use yggdrasil::server::app::create_app;
use yggdrasil::services::OperationKind;
use yggdrasil::storage::GEDCOM_BUCKET;

use common::{memory_context, FAMILY_GED};

async fn setup_test_server() -> Result<(TestServer, std::sync::Arc<yggdrasil::storage::MemoryBlobStore>)> {
    let (context, store) = memory_context().await?;
    let app = create_app(context, Some("http://localhost:5173"))?;
    let server = TestServer::new(app)?;
    Ok((server, store))
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let (server, _) = setup_test_server().await?;

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["service"], "yggdrasil");
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_upload_and_export_gedcom() -> Result<()> {
    let (server, store) = setup_test_server().await?;

    let response = server
        .post("/api/upload")
        .add_query_param("filename", "family.ged")
        .bytes(Bytes::from_static(FAMILY_GED.as_bytes()))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["individuals"], 3);
    assert_eq!(body["families"], 1);
    assert_eq!(body["places_added"], 2);
    assert_eq!(body["skipped"].as_array().unwrap().len(), 1);
    let stored_as = body["stored_as"].as_str().unwrap().to_string();
    assert!(stored_as.ends_with("_family.ged"));
    assert!(store.contains(GEDCOM_BUCKET, &stored_as).await);

    let response = server.get("/api/export-gedcom").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let disposition = response.header("content-disposition");
    let disposition = disposition.to_str()?;
    assert!(disposition.starts_with("attachment; filename=\"yggdrasil_export_"));
    assert!(disposition.ends_with(".ged\""));
    let text = response.text();
    assert!(text.starts_with("0 HEAD"));
    assert!(text.contains("1 NAME Jane /Doe/"));

    let response = server.get("/api/operations/status").await;
    let status: Value = response.json();
    assert!(status["running"].is_null());
    assert_eq!(status["last_finished"]["kind"], "gedcom_import");
    assert_eq!(status["last_finished"]["success"], true);

    Ok(())
}

#[tokio::test]
async fn test_empty_upload_is_bad_request() -> Result<()> {
    let (server, _) = setup_test_server().await?;

    let response = server
        .post("/api/upload")
        .bytes(Bytes::from_static(b"nothing to see here"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "EMPTY_DOCUMENT");
    assert!(body["error"].is_string());

    let status: Value = server.get("/api/operations/status").await.json();
    assert_eq!(status["last_finished"]["success"], false);
    Ok(())
}

#[tokio::test]
async fn test_backup_export_and_import() -> Result<()> {
    let (server, _) = setup_test_server().await?;
    server
        .post("/api/upload")
        .bytes(Bytes::from_static(FAMILY_GED.as_bytes()))
        .await;

    let response = server.get("/api/backup/export").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let disposition = response.header("content-disposition");
    assert!(disposition.to_str()?.contains("yggdrasil_backup_"));
    let archive = response.as_bytes().clone();

    let response = server.post("/api/backup/import").bytes(archive).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let summary: Value = response.json();
    assert_eq!(summary["counts"]["individuals"], 3);
    assert_eq!(summary["counts"]["places"], 2);
    assert_eq!(summary["skipped_relationships"], 0);

    let response = server
        .post("/api/backup/import")
        .bytes(Bytes::from_static(b"not a zip"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_ARCHIVE");

    let stats: Value = server.get("/api/places/stats").await.json();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["pending"], 2);

    Ok(())
}

#[tokio::test]
async fn test_place_sync() -> Result<()> {
    let (server, _) = setup_test_server().await?;
    server
        .post("/api/upload")
        .bytes(Bytes::from_static(FAMILY_GED.as_bytes()))
        .await;

    let response = server.post("/api/places/sync").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["added"], 0);

    let stats: Value = server.get("/api/places/stats").await.json();
    assert_eq!(stats["unsynced"], 0);
    Ok(())
}

#[tokio::test]
async fn test_second_operation_is_rejected_while_one_runs() -> Result<()> {
    let (context, _) = memory_context().await?;
    let server = TestServer::new(create_app(context.clone(), None)?)?;

    let permit = context.operations().try_begin(OperationKind::BackupRestore)?;

    let response = server
        .post("/api/upload")
        .bytes(Bytes::from_static(FAMILY_GED.as_bytes()))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "OPERATION_IN_PROGRESS");

    let response = server
        .post("/api/backup/import")
        .bytes(Bytes::from_static(b"not a zip"))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let status: Value = server.get("/api/operations/status").await.json();
    assert_eq!(status["running"]["kind"], "backup_restore");

    permit.finish(true, "done");

    let response = server
        .post("/api/upload")
        .bytes(Bytes::from_static(FAMILY_GED.as_bytes()))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_import_finishes_after_caller_gives_up() -> Result<()> {
    let (context, _) = memory_context().await?;

    let _ = tokio::time::timeout(
        std::time::Duration::from_nanos(1),
        context.import_gedcom(None, FAMILY_GED.as_bytes(), Default::default()),
    )
    .await;

    for _ in 0..500 {
        if !context.operation_status().is_busy() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let status = context.operation_status();
    assert!(!status.is_busy());
    let last = status.last_finished.unwrap();
    assert!(last.success, "{}", last.message);

    let stats = context.place_stats().await?;
    assert_eq!(stats.total, 2);
    Ok(())
}
