mod common;

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use serde_json::{json, Value};
use yggdrasil::database::entities::places::GeocodeStatus;
use yggdrasil::database::entities::{
    child_in_family, families, individuals, media, media_individuals, places,
};
use yggdrasil::errors::ImportExportError;
use yggdrasil::services::{
    BackupService, GedcomImportOptions, GedcomService, GenealogyGraph,
};
use yggdrasil::storage::{BlobStore, MemoryBlobStore, MEDIA_BUCKET};
use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use common::{memory_db, FAMILY_GED};

fn build_archive(entries: &[(&str, Vec<u8>)], compression: CompressionMethod) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut cursor);
        let options = FileOptions::default().compression_method(compression);
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}

fn json_bytes(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

/// An archive whose ids collide with nothing a fresh database would assign.
fn legacy_archive_entries() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        (
            "manifest.json",
            json_bytes(json!({
                "export_date": "2024-03-01T10:00:00.000000",
                "version": "1.0",
                "counts": {"individuals": 3, "families": 1, "events": 2, "media": 1, "places": 3}
            })),
        ),
        (
            "data/individuals.json",
            json_bytes(json!([
                {"id": 500, "gedcom_id": "@I1@", "first_name": "John", "last_name": "Smith", "sex": "M", "profile_image_id": 77},
                {"id": 501, "gedcom_id": "@I2@", "first_name": "Jane", "last_name": "Doe", "sex": "F", "profile_image_id": null},
                {"id": 502, "gedcom_id": "@I3@", "first_name": "Tom", "last_name": "Smith", "sex": "M", "profile_image_id": 12345}
            ])),
        ),
        (
            "data/families.json",
            json_bytes(json!([
                {"id": 900, "gedcom_id": "@F1@", "spouse1_id": 500, "spouse2_id": 501}
            ])),
        ),
        (
            "data/events.json",
            json_bytes(json!([
                {"id": 40, "event_type": "BIRT", "event_date": "1900-01-01", "place": "Springfield", "description": null},
                {"id": 41, "event_type": "MARR", "event_date": null, "place": "Springfield", "description": "chapel"}
            ])),
        ),
        (
            "data/media.json",
            json_bytes(json!([
                {"id": 77, "filename": "john.jpg", "file_path": "photos/john.jpg", "thumbnail_path": "thumbs/john.jpg",
                 "media_type": "image/jpeg", "file_size": 4, "media_date": "1950-06-01",
                 "description": "Portrait", "extracted_text": null}
            ])),
        ),
        (
            "data/places.json",
            json_bytes(json!([
                {"id": 1, "name": "Springfield", "latitude": 39.8, "longitude": -89.6, "geocoded": 1},
                {"id": 2, "name": "Atlantis", "latitude": null, "longitude": null, "geocoded": -1},
                {"id": 3, "name": "Shelbyville", "latitude": null, "longitude": null, "geocoded": 0}
            ])),
        ),
        (
            "data/relationships.json",
            json_bytes(json!({
                "individual_events": [{"individual_id": 500, "event_id": 40}],
                "family_events": [{"family_id": 900, "event_id": 41}],
                "child_in_family": [
                    {"child_id": 502, "family_id": 900},
                    {"child_id": 502, "family_id": 900},
                    {"child_id": 999, "family_id": 900}
                ],
                "media_individuals": [{"media_id": 77, "individual_id": 500}],
                "media_events": [{"media_id": 77, "event_id": 40}]
            })),
        ),
        ("media/photos/john.jpg", b"JPEG".to_vec()),
    ]
}

fn backup_service(db: &DatabaseConnection, store: &Arc<MemoryBlobStore>) -> BackupService {
    BackupService::new(db.clone(), store.clone(), MEDIA_BUCKET)
}

#[tokio::test]
async fn restore_remaps_archive_ids() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    let service = backup_service(&db, &store);

    let archive = build_archive(&legacy_archive_entries(), CompressionMethod::Deflated);
    let summary = service.import_backup(&archive).await?;

    assert_eq!(summary.export_date.as_deref(), Some("2024-03-01T10:00:00.000000"));
    assert_eq!(summary.counts.individuals, 3);
    assert_eq!(summary.counts.families, 1);
    assert_eq!(summary.counts.events, 2);
    assert_eq!(summary.counts.media, 1);
    assert_eq!(summary.counts.places, 3);
    assert_eq!(summary.counts.sources, 0);
    assert_eq!(summary.relationships["child_in_family"], 1);
    assert_eq!(summary.skipped_relationships, 1);
    assert_eq!(summary.media_files, 1);
    assert!(summary
        .warnings
        .iter()
        .any(|w| w == "Media file not found in backup: thumbs/john.jpg"));

    let graph = GenealogyGraph::load(&db).await?;
    let by_gedcom = |pointer: &str| {
        graph
            .individuals
            .iter()
            .find(|i| i.gedcom_id.as_deref() == Some(pointer))
            .cloned()
            .unwrap()
    };
    let john = by_gedcom("@I1@");
    let jane = by_gedcom("@I2@");
    let tom = by_gedcom("@I3@");

    let family = &graph.families[0];
    assert_eq!(family.spouse1_id, Some(john.id));
    assert_eq!(family.spouse2_id, Some(jane.id));
    assert_eq!(graph.child_in_family.len(), 1);
    assert_eq!(graph.child_in_family[0].child_id, tom.id);
    assert_eq!(graph.child_in_family[0].family_id, family.id);

    let photo = &graph.media[0];
    assert_eq!(john.profile_image_id, Some(photo.id));
    // The archive's profile image 12345 does not exist.
    assert_eq!(tom.profile_image_id, None);
    assert_eq!(photo.media_date, NaiveDate::from_ymd_opt(1950, 6, 1));
    assert_eq!(graph.media_individuals.len(), 1);
    assert_eq!(graph.media_individuals[0].individual_id, john.id);
    assert_eq!(graph.media_events.len(), 1);

    let birth = graph
        .events
        .iter()
        .find(|e| e.event_type == "BIRT")
        .unwrap();
    assert_eq!(graph.individual_events[0].event_id, birth.id);
    assert_eq!(graph.individual_events[0].individual_id, john.id);

    let status_of = |name: &str| {
        graph
            .places
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.get_status())
            .unwrap()
    };
    assert_eq!(status_of("Springfield"), GeocodeStatus::Success);
    assert_eq!(status_of("Atlantis"), GeocodeStatus::Failed);
    assert_eq!(status_of("Shelbyville"), GeocodeStatus::Pending);

    assert_eq!(store.get(MEDIA_BUCKET, "photos/john.jpg").await?, b"JPEG".to_vec());
    assert!(!store.contains(MEDIA_BUCKET, "thumbs/john.jpg").await);

    Ok(())
}

#[tokio::test]
async fn missing_places_file_is_tolerated() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    let service = backup_service(&db, &store);

    let entries: Vec<_> = legacy_archive_entries()
        .into_iter()
        .filter(|(name, _)| *name != "data/places.json")
        .collect();
    let summary = service
        .import_backup(&build_archive(&entries, CompressionMethod::Deflated))
        .await?;

    assert_eq!(summary.counts.places, 0);
    assert_eq!(summary.counts.individuals, 3);
    assert_eq!(places::Entity::find().count(&db).await?, 0);
    Ok(())
}

#[tokio::test]
async fn invalid_archive_leaves_graph_untouched() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    GedcomService::new(db.clone())
        .import_gedcom(FAMILY_GED.as_bytes(), GedcomImportOptions::default())
        .await?;
    let before = GenealogyGraph::load(&db).await?.counts();
    let service = backup_service(&db, &store);

    let without_manifest: Vec<_> = legacy_archive_entries()
        .into_iter()
        .filter(|(name, _)| *name != "manifest.json")
        .collect();
    let err = service
        .import_backup(&build_archive(&without_manifest, CompressionMethod::Deflated))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportExportError::InvalidArchive(_)));
    assert_eq!(err.to_string(), "Invalid backup file: missing manifest.json");

    let mut broken_json = legacy_archive_entries();
    broken_json[2].1 = b"[{\"id\": ".to_vec();
    let err = service
        .import_backup(&build_archive(&broken_json, CompressionMethod::Deflated))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportExportError::MalformedData { .. }));

    let err = service.import_backup(b"PK not really").await.unwrap_err();
    assert!(err.is_client_error());

    assert_eq!(GenealogyGraph::load(&db).await?.counts(), before);
    assert!(store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn corrupt_media_blob_becomes_warning() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    let service = backup_service(&db, &store);

    let marker = b"UNIQUE-PAYLOAD-MARKER-0123456789".to_vec();
    let entries: Vec<_> = legacy_archive_entries()
        .into_iter()
        .map(|(name, bytes)| {
            if name == "media/photos/john.jpg" {
                (name, marker.clone())
            } else {
                (name, bytes)
            }
        })
        .collect();
    let mut archive = build_archive(&entries, CompressionMethod::Stored);
    let offset = archive
        .windows(marker.len())
        .position(|window| window == marker.as_slice())
        .unwrap();
    archive[offset] ^= 0xFF;
    archive[offset + 1] ^= 0xFF;

    let summary = service.import_backup(&archive).await?;
    assert_eq!(summary.counts.media, 1);
    assert_eq!(summary.media_files, 0);
    assert!(summary
        .warnings
        .iter()
        .any(|w| w.contains("photos/john.jpg") && w.starts_with("Could not read media file")));
    assert!(store.is_empty().await);
    Ok(())
}

async fn seed_media(db: &DatabaseConnection, store: &MemoryBlobStore) -> Result<()> {
    let now = Utc::now();
    let photo = media::ActiveModel {
        filename: Set("wedding.png".to_string()),
        file_path: Set("2024/wedding.png".to_string()),
        thumbnail_path: Set(Some("thumbs/wedding.png".to_string())),
        media_type: Set(Some("image/png".to_string())),
        file_size: Set(Some(3)),
        media_date: Set(NaiveDate::from_ymd_opt(1924, 6, 12)),
        description: Set(Some("Wedding day".to_string())),
        extracted_text: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let john = individuals::Entity::find().one(db).await?.unwrap();
    media_individuals::ActiveModel {
        media_id: Set(photo.id),
        individual_id: Set(john.id),
    }
    .insert(db)
    .await?;
    let mut john: individuals::ActiveModel = john.into();
    john.profile_image_id = Set(Some(photo.id));
    john.update(db).await?;

    store.put(MEDIA_BUCKET, "2024/wedding.png", b"PNG".to_vec()).await?;
    store.put(MEDIA_BUCKET, "thumbs/wedding.png", b"png".to_vec()).await?;
    Ok(())
}

fn archive_entry(archive: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive.to_vec()))?;
    let mut file = zip.by_name(name)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

#[tokio::test]
async fn export_and_restore_roundtrip() -> Result<()> {
    let source_db = memory_db().await?;
    let source_store = Arc::new(MemoryBlobStore::new());
    GedcomService::new(source_db.clone())
        .import_gedcom(FAMILY_GED.as_bytes(), GedcomImportOptions::default())
        .await?;
    seed_media(&source_db, &source_store).await?;

    let exported = backup_service(&source_db, &source_store)
        .export_backup()
        .await?;
    assert!(exported.filename.starts_with("yggdrasil_backup_"));
    assert!(exported.filename.ends_with(".zip"));
    assert!(exported.warnings.is_empty());

    let manifest: Value = serde_json::from_slice(&archive_entry(&exported.bytes, "manifest.json")?)?;
    assert_eq!(manifest["version"], "1.0");
    assert_eq!(manifest["counts"]["individuals"], 3);
    assert_eq!(manifest["counts"]["media"], 1);
    let relationships: Value =
        serde_json::from_slice(&archive_entry(&exported.bytes, "data/relationships.json")?)?;
    assert_eq!(relationships["child_in_family"].as_array().unwrap().len(), 1);
    assert_eq!(archive_entry(&exported.bytes, "media/2024/wedding.png")?, b"PNG".to_vec());
    assert_eq!(archive_entry(&exported.bytes, "media/thumbs/wedding.png")?, b"png".to_vec());

    // Restoring twice replaces rather than accumulates.
    let target_db = memory_db().await?;
    let target_store = Arc::new(MemoryBlobStore::new());
    let target = backup_service(&target_db, &target_store);
    target.import_backup(&exported.bytes).await?;
    let summary = target.import_backup(&exported.bytes).await?;
    assert!(summary.warnings.is_empty(), "{:?}", summary.warnings);
    assert_eq!(summary.media_files, 2);
    assert_eq!(summary.skipped_relationships, 0);

    let before = GenealogyGraph::load(&source_db).await?;
    let after = GenealogyGraph::load(&target_db).await?;
    assert_eq!(before.counts(), after.counts());
    assert_eq!(before.relationship_counts(), after.relationship_counts());

    let names = |graph: &GenealogyGraph| {
        let mut names: Vec<String> = graph.individuals.iter().map(|i| i.display_name()).collect();
        names.sort();
        names
    };
    assert_eq!(names(&before), names(&after));

    let john = after
        .individuals
        .iter()
        .find(|i| i.display_name() == "John Smith")
        .unwrap();
    assert_eq!(john.profile_image_id, Some(after.media[0].id));
    let family = families::Entity::find().one(&target_db).await?.unwrap();
    assert_eq!(family.spouse1_id, Some(john.id));
    assert_eq!(child_in_family::Entity::find().count(&target_db).await?, 1);

    assert!(target_store.contains(MEDIA_BUCKET, "2024/wedding.png").await);
    assert!(target_store.contains(MEDIA_BUCKET, "thumbs/wedding.png").await);
    Ok(())
}

#[tokio::test]
async fn export_reports_missing_blobs() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    GedcomService::new(db.clone())
        .import_gedcom(FAMILY_GED.as_bytes(), GedcomImportOptions::default())
        .await?;
    seed_media(&db, &store).await?;
    store.remove(MEDIA_BUCKET, "2024/wedding.png").await;

    let exported = backup_service(&db, &store).export_backup().await?;
    assert_eq!(exported.warnings.len(), 1);
    assert!(exported.warnings[0].contains("2024/wedding.png"));
    assert!(archive_entry(&exported.bytes, "media/2024/wedding.png").is_err());
    assert!(archive_entry(&exported.bytes, "media/thumbs/wedding.png").is_ok());
    Ok(())
}

fn replace_entry(
    mut entries: Vec<(&'static str, Vec<u8>)>,
    name: &str,
    bytes: Vec<u8>,
) -> Vec<(&'static str, Vec<u8>)> {
    for entry in entries.iter_mut() {
        if entry.0 == name {
            entry.1 = bytes.clone();
        }
    }
    entries
}

#[tokio::test]
async fn malformed_records_are_skipped() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    let service = backup_service(&db, &store);

    let entries = replace_entry(
        legacy_archive_entries(),
        "data/events.json",
        json_bytes(json!([
            {"id": 40, "event_type": "BIRT", "event_date": "1900-01-01", "place": "Springfield"},
            {"id": 41, "event_type": null},
            {"event_type": "DEAT"}
        ])),
    );
    let entries = replace_entry(
        entries,
        "data/individuals.json",
        json_bytes(json!([
            {"id": 500, "gedcom_id": "@I1@", "first_name": "John", "last_name": "Smith", "sex": "M"},
            {"id": "not a number", "first_name": "Broken"},
            {"id": 501, "gedcom_id": "@I2@", "first_name": "Jane", "last_name": "Doe", "sex": "F"},
            {"id": 502, "gedcom_id": "@I3@", "first_name": "Tom", "last_name": "Smith", "sex": "M"}
        ])),
    );
    let summary = service
        .import_backup(&build_archive(&entries, CompressionMethod::Deflated))
        .await?;

    assert_eq!(summary.counts.individuals, 3);
    assert_eq!(summary.counts.events, 1);
    // Undecodable individual, undecodable event, event with a null type.
    assert_eq!(summary.skipped_records, 3);
    assert!(summary
        .warnings
        .iter()
        .any(|w| w.starts_with("Skipped record 1 in data/individuals.json")));
    assert!(summary
        .warnings
        .iter()
        .any(|w| w.starts_with("Event 41 has unknown type")));
    // The marriage pointed at the dropped event.
    assert_eq!(summary.relationships["family_events"], 0);

    let graph = GenealogyGraph::load(&db).await?;
    assert_eq!(graph.events.len(), 1);
    assert_eq!(graph.events[0].event_type, "BIRT");
    assert_eq!(graph.individual_events.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unknown_codes_are_not_stored() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    let service = backup_service(&db, &store);

    let entries = replace_entry(
        legacy_archive_entries(),
        "data/events.json",
        json_bytes(json!([
            {"id": 40, "event_type": "BIRT", "event_date": "1900-01-01"},
            {"id": 41, "event_type": "CHR"}
        ])),
    );
    let entries = replace_entry(
        entries,
        "data/individuals.json",
        json_bytes(json!([
            {"id": 500, "gedcom_id": "@I1@", "first_name": "John", "sex": "Q"},
            {"id": 501, "gedcom_id": "@I2@", "first_name": "Jane", "sex": "f"},
            {"id": 502, "gedcom_id": "@I3@", "first_name": "Tom", "sex": null}
        ])),
    );
    let summary = service
        .import_backup(&build_archive(&entries, CompressionMethod::Deflated))
        .await?;

    assert_eq!(summary.counts.events, 1);
    assert_eq!(summary.skipped_records, 1);
    assert!(summary
        .warnings
        .iter()
        .any(|w| w.contains("Event 41") && w.contains("CHR")));
    assert!(summary
        .warnings
        .iter()
        .any(|w| w.contains("Individual 500") && w.contains("\"Q\"")));

    let graph = GenealogyGraph::load(&db).await?;
    assert!(graph.events.iter().all(|e| e.event_type != "CHR"));
    let sex_of = |name: &str| {
        graph
            .individuals
            .iter()
            .find(|i| i.first_name.as_deref() == Some(name))
            .and_then(|i| i.sex.clone())
    };
    assert_eq!(sex_of("John"), None);
    assert_eq!(sex_of("Jane"), Some("F".to_string()));
    assert_eq!(sex_of("Tom"), None);
    Ok(())
}

#[tokio::test]
async fn repeated_archive_ids_are_reported() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    let service = backup_service(&db, &store);

    let entries = replace_entry(
        legacy_archive_entries(),
        "data/individuals.json",
        json_bytes(json!([
            {"id": 500, "gedcom_id": "@I1@", "first_name": "John", "last_name": "Smith", "profile_image_id": 77},
            {"id": 500, "gedcom_id": "@I9@", "first_name": "Shadow", "last_name": "Copy"},
            {"id": 501, "gedcom_id": "@I2@", "first_name": "Jane", "last_name": "Doe"},
            {"id": 502, "gedcom_id": "@I3@", "first_name": "Tom", "last_name": "Smith"}
        ])),
    );
    let entries = replace_entry(
        entries,
        "data/families.json",
        json_bytes(json!([
            {"id": 900, "gedcom_id": "@F1@", "spouse1_id": 500, "spouse2_id": 501},
            {"id": 900, "gedcom_id": "@F2@", "spouse1_id": 502}
        ])),
    );
    let summary = service
        .import_backup(&build_archive(&entries, CompressionMethod::Deflated))
        .await?;

    assert_eq!(summary.counts.individuals, 3);
    assert_eq!(summary.counts.families, 1);
    assert_eq!(summary.skipped_records, 2);
    assert!(summary
        .warnings
        .iter()
        .any(|w| w == "Duplicate individual id 500 skipped"));
    assert!(summary
        .warnings
        .iter()
        .any(|w| w == "Duplicate family id 900 skipped"));

    assert_eq!(individuals::Entity::find().count(&db).await?, 3);
    let graph = GenealogyGraph::load(&db).await?;
    assert!(graph.individuals.iter().all(|i| i.display_name() != "Shadow Copy"));
    let john = graph
        .individuals
        .iter()
        .find(|i| i.gedcom_id.as_deref() == Some("@I1@"))
        .unwrap();
    assert_eq!(john.profile_image_id, Some(graph.media[0].id));
    assert_eq!(graph.families[0].spouse1_id, Some(john.id));
    Ok(())
}

#[tokio::test]
async fn failure_inside_restore_rolls_back() -> Result<()> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    GedcomService::new(db.clone())
        .import_gedcom(FAMILY_GED.as_bytes(), GedcomImportOptions::default())
        .await?;
    let before = GenealogyGraph::load(&db).await?;

    // Clearing succeeds; the first event insert afterwards aborts.
    db.execute_unprepared(
        "CREATE TRIGGER reject_event_insert BEFORE INSERT ON events \
         BEGIN SELECT RAISE(ABORT, 'event inserts disabled'); END;",
    )
    .await?;

    let service = backup_service(&db, &store);
    let archive = build_archive(&legacy_archive_entries(), CompressionMethod::Deflated);
    let err = service.import_backup(&archive).await.unwrap_err();
    assert!(matches!(err, ImportExportError::Database(_)));
    assert!(err.to_string().contains("event inserts disabled"));

    let after = GenealogyGraph::load(&db).await?;
    assert_eq!(before.counts(), after.counts());
    assert_eq!(before.relationship_counts(), after.relationship_counts());
    let names = |graph: &GenealogyGraph| {
        let mut names: Vec<String> = graph.individuals.iter().map(|i| i.display_name()).collect();
        names.sort();
        names
    };
    assert_eq!(names(&before), names(&after));
    assert!(store.is_empty().await);
    Ok(())
}
