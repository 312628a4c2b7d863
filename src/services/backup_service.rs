use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DatabaseTransaction, DbErr, Set, TransactionTrait,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use zip::{result::ZipError, write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use super::graph_store::{
    clear_graph, insert_edges, GenealogyGraph, GraphCounts, RelationshipCounts,
};
use crate::database::entities::events::EventType;
use crate::database::entities::individuals::Sex;
use crate::database::entities::places::GeocodeStatus;
use crate::database::entities::{
    child_in_family, events, families, family_events, family_notes, family_sources,
    individual_events, individual_notes, individual_sources, individuals, media, media_events,
    media_individuals, notes, places, sources,
};
use crate::errors::{ImportExportError, ImportExportResult};
use crate::storage::BlobStore;

pub const BACKUP_FORMAT_VERSION: &str = "1.0";

const MANIFEST_PATH: &str = "manifest.json";
const INDIVIDUALS_PATH: &str = "data/individuals.json";
const FAMILIES_PATH: &str = "data/families.json";
const EVENTS_PATH: &str = "data/events.json";
const MEDIA_PATH: &str = "data/media.json";
const PLACES_PATH: &str = "data/places.json";
const SOURCES_PATH: &str = "data/sources.json";
const NOTES_PATH: &str = "data/notes.json";
const RELATIONSHIPS_PATH: &str = "data/relationships.json";

// ----- Archive record formats -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    #[serde(default)]
    pub export_date: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub counts: GraphCounts,
    #[serde(default)]
    pub relationship_counts: RelationshipCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    pub id: i32,
    #[serde(default)]
    pub gedcom_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub profile_image_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub id: i32,
    #[serde(default)]
    pub gedcom_id: Option<String>,
    #[serde(default)]
    pub spouse1_id: Option<i32>,
    #[serde(default)]
    pub spouse2_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i32,
    /// Nullable in older archives.
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i32,
    pub filename: String,
    pub file_path: String,
    #[serde(default)]
    pub thumbnail_path: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub media_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

impl MediaRecord {
    fn blob_paths(&self) -> Vec<&str> {
        let mut paths = vec![self.file_path.as_str()];
        if let Some(thumbnail) = self.thumbnail_path.as_deref() {
            if !thumbnail.is_empty() && thumbnail != self.file_path {
                paths.push(thumbnail);
            }
        }
        paths
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    #[serde(default)]
    pub id: Option<i32>,
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// 0 = pending, 1 = success, -1 = failed
    #[serde(default)]
    pub geocoded: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: i32,
    #[serde(default)]
    pub gedcom_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publication_info: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: i32,
    #[serde(default)]
    pub gedcom_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndividualEventPair {
    pub individual_id: i32,
    pub event_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FamilyEventPair {
    pub family_id: i32,
    pub event_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildInFamilyPair {
    pub child_id: i32,
    pub family_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaIndividualPair {
    pub media_id: i32,
    pub individual_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaEventPair {
    pub media_id: i32,
    pub event_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndividualSourcePair {
    pub individual_id: i32,
    pub source_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FamilySourcePair {
    pub family_id: i32,
    pub source_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndividualNotePair {
    pub individual_id: i32,
    pub note_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FamilyNotePair {
    pub family_id: i32,
    pub note_id: i32,
}

/// `data/relationships.json`. Every list is optional on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipsRecord {
    #[serde(default)]
    pub individual_events: Vec<IndividualEventPair>,
    #[serde(default)]
    pub family_events: Vec<FamilyEventPair>,
    #[serde(default)]
    pub child_in_family: Vec<ChildInFamilyPair>,
    #[serde(default)]
    pub media_individuals: Vec<MediaIndividualPair>,
    #[serde(default)]
    pub media_events: Vec<MediaEventPair>,
    #[serde(default)]
    pub individual_sources: Vec<IndividualSourcePair>,
    #[serde(default)]
    pub family_sources: Vec<FamilySourcePair>,
    #[serde(default)]
    pub individual_notes: Vec<IndividualNotePair>,
    #[serde(default)]
    pub family_notes: Vec<FamilyNotePair>,
}

impl From<&individuals::Model> for IndividualRecord {
    fn from(model: &individuals::Model) -> Self {
        Self {
            id: model.id,
            gedcom_id: model.gedcom_id.clone(),
            first_name: model.first_name.clone(),
            last_name: model.last_name.clone(),
            sex: model.sex.clone(),
            profile_image_id: model.profile_image_id,
        }
    }
}

impl From<&families::Model> for FamilyRecord {
    fn from(model: &families::Model) -> Self {
        Self {
            id: model.id,
            gedcom_id: model.gedcom_id.clone(),
            spouse1_id: model.spouse1_id,
            spouse2_id: model.spouse2_id,
        }
    }
}

impl From<&events::Model> for EventRecord {
    fn from(model: &events::Model) -> Self {
        Self {
            id: model.id,
            event_type: Some(model.event_type.clone()),
            event_date: model.event_date,
            place: model.place.clone(),
            description: model.description.clone(),
        }
    }
}

impl From<&media::Model> for MediaRecord {
    fn from(model: &media::Model) -> Self {
        Self {
            id: model.id,
            filename: model.filename.clone(),
            file_path: model.file_path.clone(),
            thumbnail_path: model.thumbnail_path.clone(),
            media_type: model.media_type.clone(),
            file_size: model.file_size,
            media_date: model.media_date,
            description: model.description.clone(),
            extracted_text: model.extracted_text.clone(),
        }
    }
}

impl From<&places::Model> for PlaceRecord {
    fn from(model: &places::Model) -> Self {
        Self {
            id: Some(model.id),
            name: model.name.clone(),
            latitude: model.latitude,
            longitude: model.longitude,
            geocoded: model.get_status().code(),
        }
    }
}

impl From<&sources::Model> for SourceRecord {
    fn from(model: &sources::Model) -> Self {
        Self {
            id: model.id,
            gedcom_id: model.gedcom_id.clone(),
            title: model.title.clone(),
            author: model.author.clone(),
            publication_info: model.publication_info.clone(),
            repository: model.repository.clone(),
        }
    }
}

impl From<&notes::Model> for NoteRecord {
    fn from(model: &notes::Model) -> Self {
        Self {
            id: model.id,
            gedcom_id: model.gedcom_id.clone(),
            text: model.text.clone(),
        }
    }
}

impl From<&GenealogyGraph> for RelationshipsRecord {
    fn from(graph: &GenealogyGraph) -> Self {
        Self {
            individual_events: graph
                .individual_events
                .iter()
                .map(|e| IndividualEventPair {
                    individual_id: e.individual_id,
                    event_id: e.event_id,
                })
                .collect(),
            family_events: graph
                .family_events
                .iter()
                .map(|e| FamilyEventPair {
                    family_id: e.family_id,
                    event_id: e.event_id,
                })
                .collect(),
            child_in_family: graph
                .child_in_family
                .iter()
                .map(|e| ChildInFamilyPair {
                    child_id: e.child_id,
                    family_id: e.family_id,
                })
                .collect(),
            media_individuals: graph
                .media_individuals
                .iter()
                .map(|e| MediaIndividualPair {
                    media_id: e.media_id,
                    individual_id: e.individual_id,
                })
                .collect(),
            media_events: graph
                .media_events
                .iter()
                .map(|e| MediaEventPair {
                    media_id: e.media_id,
                    event_id: e.event_id,
                })
                .collect(),
            individual_sources: graph
                .individual_sources
                .iter()
                .map(|e| IndividualSourcePair {
                    individual_id: e.individual_id,
                    source_id: e.source_id,
                })
                .collect(),
            family_sources: graph
                .family_sources
                .iter()
                .map(|e| FamilySourcePair {
                    family_id: e.family_id,
                    source_id: e.source_id,
                })
                .collect(),
            individual_notes: graph
                .individual_notes
                .iter()
                .map(|e| IndividualNotePair {
                    individual_id: e.individual_id,
                    note_id: e.note_id,
                })
                .collect(),
            family_notes: graph
                .family_notes
                .iter()
                .map(|e| FamilyNotePair {
                    family_id: e.family_id,
                    note_id: e.note_id,
                })
                .collect(),
        }
    }
}

// ----- Operation results -----

pub struct BackupArchiveFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub counts: GraphCounts,
    /// Blobs that could not be fetched and are missing from the archive.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupRestoreSummary {
    pub export_date: Option<String>,
    pub counts: GraphCounts,
    pub relationships: RelationshipCounts,
    /// Relationship pairs dropped because they were malformed or an endpoint
    /// was not restored.
    pub skipped_relationships: usize,
    /// Entity records left out: undecodable, repeated ids, unknown event types.
    pub skipped_records: usize,
    pub media_files: usize,
    pub warnings: Vec<String>,
}

/// Everything read out of an archive, validated before the database is touched.
struct ParsedArchive {
    manifest: BackupManifest,
    individuals: Vec<IndividualRecord>,
    families: Vec<FamilyRecord>,
    events: Vec<EventRecord>,
    media: Vec<MediaRecord>,
    places: Vec<PlaceRecord>,
    sources: Vec<SourceRecord>,
    notes: Vec<NoteRecord>,
    relationships: RelationshipsRecord,
    blobs: Vec<(String, Vec<u8>)>,
    warnings: Vec<String>,
    skipped_records: usize,
    skipped_relationships: usize,
}

/// `data/relationships.json` before each pair is decoded.
#[derive(Debug, Default, Deserialize)]
struct RawRelationships {
    #[serde(default)]
    individual_events: Vec<Value>,
    #[serde(default)]
    family_events: Vec<Value>,
    #[serde(default)]
    child_in_family: Vec<Value>,
    #[serde(default)]
    media_individuals: Vec<Value>,
    #[serde(default)]
    media_events: Vec<Value>,
    #[serde(default)]
    individual_sources: Vec<Value>,
    #[serde(default)]
    family_sources: Vec<Value>,
    #[serde(default)]
    individual_notes: Vec<Value>,
    #[serde(default)]
    family_notes: Vec<Value>,
}

/// Decodes archive records one at a time so a bad record is skipped
/// instead of failing its whole file.
#[derive(Debug, Default)]
struct RecordDecoder {
    warnings: Vec<String>,
    skipped: usize,
}

impl RecordDecoder {
    fn decode<T: DeserializeOwned>(&mut self, path: &str, values: Vec<Value>) -> Vec<T> {
        let mut records = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    let message = format!("Skipped record {} in {}: {}", index, path, e);
                    warn!("{}", message);
                    self.warnings.push(message);
                    self.skipped += 1;
                }
            }
        }
        records
    }
}

/// Old archive id -> new id, per entity kind.
#[derive(Default)]
struct IdMaps {
    individuals: HashMap<i32, i32>,
    families: HashMap<i32, i32>,
    events: HashMap<i32, i32>,
    media: HashMap<i32, i32>,
    sources: HashMap<i32, i32>,
    notes: HashMap<i32, i32>,
}

pub struct BackupService {
    db: DatabaseConnection,
    blob_store: Arc<dyn BlobStore>,
    media_bucket: String,
}

impl BackupService {
    pub fn new(
        db: DatabaseConnection,
        blob_store: Arc<dyn BlobStore>,
        media_bucket: impl Into<String>,
    ) -> Self {
        Self {
            db,
            blob_store,
            media_bucket: media_bucket.into(),
        }
    }

    /// Serialize the whole graph and its media blobs into a zip archive.
    /// Ids in the archive are the current internal ids.
    pub async fn export_backup(&self) -> ImportExportResult<BackupArchiveFile> {
        let graph = GenealogyGraph::load(&self.db).await?;
        let counts = graph.counts();

        let mut warnings = Vec::new();
        let mut blobs: Vec<(String, Vec<u8>)> = Vec::new();
        for item in &graph.media {
            for path in item.blob_paths() {
                match self.blob_store.get(&self.media_bucket, path).await {
                    Ok(bytes) => blobs.push((format!("media/{}", path), bytes)),
                    Err(e) => {
                        warn!("Could not export media file {}: {}", path, e);
                        warnings.push(format!("Could not export media file {}: {}", path, e));
                    }
                }
            }
        }

        let manifest = BackupManifest {
            export_date: Some(Utc::now().to_rfc3339()),
            version: Some(BACKUP_FORMAT_VERSION.to_string()),
            counts,
            relationship_counts: graph.relationship_counts(),
        };

        let individuals: Vec<IndividualRecord> = graph.individuals.iter().map(Into::into).collect();
        let families: Vec<FamilyRecord> = graph.families.iter().map(Into::into).collect();
        let events: Vec<EventRecord> = graph.events.iter().map(Into::into).collect();
        let media: Vec<MediaRecord> = graph.media.iter().map(Into::into).collect();
        let places: Vec<PlaceRecord> = graph.places.iter().map(Into::into).collect();
        let sources: Vec<SourceRecord> = graph.sources.iter().map(Into::into).collect();
        let notes: Vec<NoteRecord> = graph.notes.iter().map(Into::into).collect();
        let relationships = RelationshipsRecord::from(&graph);

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

            write_json_entry(&mut zip, MANIFEST_PATH, &manifest)?;
            write_json_entry(&mut zip, INDIVIDUALS_PATH, &individuals)?;
            write_json_entry(&mut zip, FAMILIES_PATH, &families)?;
            write_json_entry(&mut zip, EVENTS_PATH, &events)?;
            write_json_entry(&mut zip, MEDIA_PATH, &media)?;
            write_json_entry(&mut zip, PLACES_PATH, &places)?;
            write_json_entry(&mut zip, SOURCES_PATH, &sources)?;
            write_json_entry(&mut zip, NOTES_PATH, &notes)?;
            write_json_entry(&mut zip, RELATIONSHIPS_PATH, &relationships)?;

            for (path, bytes) in &blobs {
                zip.start_file(path.as_str(), options)?;
                zip.write_all(bytes)?;
            }

            zip.finish()?;
        }

        info!(
            "Exported backup: {} individuals, {} families, {} events, {} media ({} blobs), {} places",
            counts.individuals,
            counts.families,
            counts.events,
            counts.media,
            blobs.len(),
            counts.places
        );

        Ok(BackupArchiveFile {
            filename: format!(
                "yggdrasil_backup_{}.zip",
                Utc::now().format("%Y%m%d_%H%M%S")
            ),
            bytes: cursor.into_inner(),
            counts,
            warnings,
        })
    }

    /// Replace the whole graph with the archive's contents.
    ///
    /// The archive is fully read and validated first. Clearing and
    /// repopulating share one transaction, so any failure leaves the previous
    /// graph in place. Media blobs are written after the commit; a blob that
    /// is missing, unreadable or rejected by the store is a warning.
    pub async fn import_backup(&self, archive_bytes: &[u8]) -> ImportExportResult<BackupRestoreSummary> {
        let parsed = parse_archive(archive_bytes)?;
        info!(
            "Restoring backup exported {}",
            parsed.manifest.export_date.as_deref().unwrap_or("at an unknown date")
        );

        let mut summary = BackupRestoreSummary {
            export_date: parsed.manifest.export_date.clone(),
            warnings: parsed.warnings.clone(),
            skipped_records: parsed.skipped_records,
            skipped_relationships: parsed.skipped_relationships,
            ..Default::default()
        };

        let txn = self.db.begin().await?;
        clear_graph(&txn).await?;

        let mut restorer = Restorer {
            txn: &txn,
            now: Utc::now(),
            maps: IdMaps::default(),
            summary: &mut summary,
        };
        restorer.restore_individuals(&parsed.individuals).await?;
        restorer.restore_families(&parsed.families).await?;
        restorer.restore_events(&parsed.events).await?;
        restorer.restore_media(&parsed.media).await?;
        restorer.restore_places(&parsed.places).await?;
        restorer.restore_sources(&parsed.sources).await?;
        restorer.restore_notes(&parsed.notes).await?;
        restorer.restore_relationships(&parsed.relationships).await?;
        restorer.restore_profile_images(&parsed.individuals).await?;

        txn.commit().await?;

        for (path, bytes) in parsed.blobs {
            match self.blob_store.put(&self.media_bucket, &path, bytes).await {
                Ok(()) => summary.media_files += 1,
                Err(e) => {
                    warn!("Could not restore media file {}: {}", path, e);
                    summary
                        .warnings
                        .push(format!("Could not restore media file {}: {}", path, e));
                }
            }
        }

        info!(
            "Backup restored: {} individuals, {} families, {} events, {} media ({} files), {} places, {} warnings",
            summary.counts.individuals,
            summary.counts.families,
            summary.counts.events,
            summary.counts.media,
            summary.media_files,
            summary.counts.places,
            summary.warnings.len()
        );

        Ok(summary)
    }
}

struct Restorer<'a> {
    txn: &'a DatabaseTransaction,
    now: chrono::DateTime<Utc>,
    maps: IdMaps,
    summary: &'a mut BackupRestoreSummary,
}

impl<'a> Restorer<'a> {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.summary.warnings.push(message);
    }

    fn skip(&mut self, message: String) {
        self.summary.skipped_records += 1;
        self.warn(message);
    }

    /// Only the first record carrying an archive id is restored.
    fn is_repeated(&mut self, kind: &str, old_id: i32, repeated: bool) -> bool {
        if repeated {
            self.skip(format!("Duplicate {} id {} skipped", kind, old_id));
        }
        repeated
    }

    /// Sex codes outside M/F/U are stored as absent.
    fn checked_sex(&mut self, record: &IndividualRecord) -> Option<String> {
        let raw = record.sex.as_deref()?;
        if raw.trim().is_empty() {
            return None;
        }
        match Sex::parse(raw) {
            Some(sex) => Some(sex.into()),
            None => {
                self.warn(format!(
                    "Individual {} has unknown sex {:?}; stored as absent",
                    record.id, raw
                ));
                None
            }
        }
    }

    /// Keep a `gedcom_id` only the first time it is seen.
    fn unique_gedcom_id(
        &mut self,
        seen: &mut HashSet<String>,
        kind: &str,
        old_id: i32,
        gedcom_id: &Option<String>,
    ) -> Option<String> {
        let gedcom_id = gedcom_id.as_ref()?;
        if seen.insert(gedcom_id.clone()) {
            Some(gedcom_id.clone())
        } else {
            self.warn(format!(
                "Duplicate gedcom_id {} on {} {} dropped",
                gedcom_id, kind, old_id
            ));
            None
        }
    }

    async fn restore_individuals(&mut self, records: &[IndividualRecord]) -> Result<(), DbErr> {
        let mut seen = HashSet::new();
        for record in records {
            let repeated = self.maps.individuals.contains_key(&record.id);
            if self.is_repeated("individual", record.id, repeated) {
                continue;
            }
            let gedcom_id = self.unique_gedcom_id(&mut seen, "individual", record.id, &record.gedcom_id);
            let sex = self.checked_sex(record);
            let model = individuals::ActiveModel {
                gedcom_id: Set(gedcom_id),
                first_name: Set(record.first_name.clone()),
                last_name: Set(record.last_name.clone()),
                sex: Set(sex),
                // Media does not exist yet; set in the last step.
                profile_image_id: Set(None),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;
            self.maps.individuals.insert(record.id, model.id);
            self.summary.counts.individuals += 1;
        }
        debug!("Restored {} individuals", self.summary.counts.individuals);
        Ok(())
    }

    async fn restore_families(&mut self, records: &[FamilyRecord]) -> Result<(), DbErr> {
        let mut seen = HashSet::new();
        for record in records {
            let repeated = self.maps.families.contains_key(&record.id);
            if self.is_repeated("family", record.id, repeated) {
                continue;
            }
            let gedcom_id = self.unique_gedcom_id(&mut seen, "family", record.id, &record.gedcom_id);
            let spouse1 = record
                .spouse1_id
                .and_then(|old| self.maps.individuals.get(&old).copied());
            let mut spouse2 = record
                .spouse2_id
                .and_then(|old| self.maps.individuals.get(&old).copied());
            if spouse1.is_some() && spouse1 == spouse2 {
                self.warn(format!(
                    "Family {} lists the same individual as both spouses; second spouse dropped",
                    record.id
                ));
                spouse2 = None;
            }

            let model = families::ActiveModel {
                gedcom_id: Set(gedcom_id),
                spouse1_id: Set(spouse1),
                spouse2_id: Set(spouse2),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;
            self.maps.families.insert(record.id, model.id);
            self.summary.counts.families += 1;
        }
        debug!("Restored {} families", self.summary.counts.families);
        Ok(())
    }

    async fn restore_events(&mut self, records: &[EventRecord]) -> Result<(), DbErr> {
        for record in records {
            let repeated = self.maps.events.contains_key(&record.id);
            if self.is_repeated("event", record.id, repeated) {
                continue;
            }
            let Some(kind) = record.event_type.as_deref().and_then(EventType::from_tag) else {
                self.skip(format!(
                    "Event {} has unknown type {:?}; skipped",
                    record.id, record.event_type
                ));
                continue;
            };
            let model = events::ActiveModel {
                event_type: Set(kind.into()),
                event_date: Set(record.event_date),
                place: Set(record.place.clone()),
                description: Set(record.description.clone()),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;
            self.maps.events.insert(record.id, model.id);
            self.summary.counts.events += 1;
        }
        debug!("Restored {} events", self.summary.counts.events);
        Ok(())
    }

    async fn restore_media(&mut self, records: &[MediaRecord]) -> Result<(), DbErr> {
        for record in records {
            let repeated = self.maps.media.contains_key(&record.id);
            if self.is_repeated("media", record.id, repeated) {
                continue;
            }
            let model = media::ActiveModel {
                filename: Set(record.filename.clone()),
                file_path: Set(record.file_path.clone()),
                thumbnail_path: Set(record.thumbnail_path.clone()),
                media_type: Set(record.media_type.clone()),
                file_size: Set(record.file_size),
                media_date: Set(record.media_date),
                description: Set(record.description.clone()),
                extracted_text: Set(record.extracted_text.clone()),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;
            self.maps.media.insert(record.id, model.id);
            self.summary.counts.media += 1;
        }
        debug!("Restored {} media records", self.summary.counts.media);
        Ok(())
    }

    /// Places are keyed by name; ids are not remapped.
    async fn restore_places(&mut self, records: &[PlaceRecord]) -> Result<(), DbErr> {
        let mut seen = HashSet::new();
        for record in records {
            let name = record.name.trim();
            if name.is_empty() {
                self.warn("Place with an empty name skipped".to_string());
                continue;
            }
            if !seen.insert(name.to_string()) {
                self.warn(format!("Duplicate place {} skipped", name));
                continue;
            }

            places::ActiveModel {
                name: Set(name.to_string()),
                latitude: Set(record.latitude),
                longitude: Set(record.longitude),
                geocode_status: Set(GeocodeStatus::from_code(record.geocoded).into()),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;
            self.summary.counts.places += 1;
        }
        debug!("Restored {} places", self.summary.counts.places);
        Ok(())
    }

    async fn restore_sources(&mut self, records: &[SourceRecord]) -> Result<(), DbErr> {
        let mut seen = HashSet::new();
        for record in records {
            let repeated = self.maps.sources.contains_key(&record.id);
            if self.is_repeated("source", record.id, repeated) {
                continue;
            }
            let gedcom_id = self.unique_gedcom_id(&mut seen, "source", record.id, &record.gedcom_id);
            let model = sources::ActiveModel {
                gedcom_id: Set(gedcom_id),
                title: Set(record.title.clone()),
                author: Set(record.author.clone()),
                publication_info: Set(record.publication_info.clone()),
                repository: Set(record.repository.clone()),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;
            self.maps.sources.insert(record.id, model.id);
            self.summary.counts.sources += 1;
        }
        Ok(())
    }

    async fn restore_notes(&mut self, records: &[NoteRecord]) -> Result<(), DbErr> {
        let mut seen = HashSet::new();
        for record in records {
            let repeated = self.maps.notes.contains_key(&record.id);
            if self.is_repeated("note", record.id, repeated) {
                continue;
            }
            let gedcom_id = self.unique_gedcom_id(&mut seen, "note", record.id, &record.gedcom_id);
            let model = notes::ActiveModel {
                gedcom_id: Set(gedcom_id),
                text: Set(record.text.clone()),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;
            self.maps.notes.insert(record.id, model.id);
            self.summary.counts.notes += 1;
        }
        Ok(())
    }

    /// Replay every edge list through the id maps. Pairs with an unmapped
    /// endpoint are dropped; repeated pairs are inserted once.
    async fn restore_relationships(&mut self, rel: &RelationshipsRecord) -> Result<(), DbErr> {
        let maps = &self.maps;

        let (individual_events_rows, dropped_a) = remap_pairs(
            rel.individual_events.iter().map(|p| (p.individual_id, p.event_id)),
            &maps.individuals,
            &maps.events,
        );
        let (family_events_rows, dropped_b) = remap_pairs(
            rel.family_events.iter().map(|p| (p.family_id, p.event_id)),
            &maps.families,
            &maps.events,
        );
        let (child_rows, dropped_c) = remap_pairs(
            rel.child_in_family.iter().map(|p| (p.child_id, p.family_id)),
            &maps.individuals,
            &maps.families,
        );
        let (media_individual_rows, dropped_d) = remap_pairs(
            rel.media_individuals.iter().map(|p| (p.media_id, p.individual_id)),
            &maps.media,
            &maps.individuals,
        );
        let (media_event_rows, dropped_e) = remap_pairs(
            rel.media_events.iter().map(|p| (p.media_id, p.event_id)),
            &maps.media,
            &maps.events,
        );
        let (individual_source_rows, dropped_f) = remap_pairs(
            rel.individual_sources.iter().map(|p| (p.individual_id, p.source_id)),
            &maps.individuals,
            &maps.sources,
        );
        let (family_source_rows, dropped_g) = remap_pairs(
            rel.family_sources.iter().map(|p| (p.family_id, p.source_id)),
            &maps.families,
            &maps.sources,
        );
        let (individual_note_rows, dropped_h) = remap_pairs(
            rel.individual_notes.iter().map(|p| (p.individual_id, p.note_id)),
            &maps.individuals,
            &maps.notes,
        );
        let (family_note_rows, dropped_i) = remap_pairs(
            rel.family_notes.iter().map(|p| (p.family_id, p.note_id)),
            &maps.families,
            &maps.notes,
        );

        let dropped = dropped_a
            + dropped_b
            + dropped_c
            + dropped_d
            + dropped_e
            + dropped_f
            + dropped_g
            + dropped_h
            + dropped_i;

        let mut counts = RelationshipCounts::new();
        counts.insert(
            "individual_events".to_string(),
            insert_edges(
                self.txn,
                individual_events_rows
                    .into_iter()
                    .map(|(individual_id, event_id)| individual_events::ActiveModel {
                        individual_id: Set(individual_id),
                        event_id: Set(event_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );
        counts.insert(
            "family_events".to_string(),
            insert_edges(
                self.txn,
                family_events_rows
                    .into_iter()
                    .map(|(family_id, event_id)| family_events::ActiveModel {
                        family_id: Set(family_id),
                        event_id: Set(event_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );
        counts.insert(
            "child_in_family".to_string(),
            insert_edges(
                self.txn,
                child_rows
                    .into_iter()
                    .map(|(child_id, family_id)| child_in_family::ActiveModel {
                        child_id: Set(child_id),
                        family_id: Set(family_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );
        counts.insert(
            "media_individuals".to_string(),
            insert_edges(
                self.txn,
                media_individual_rows
                    .into_iter()
                    .map(|(media_id, individual_id)| media_individuals::ActiveModel {
                        media_id: Set(media_id),
                        individual_id: Set(individual_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );
        counts.insert(
            "media_events".to_string(),
            insert_edges(
                self.txn,
                media_event_rows
                    .into_iter()
                    .map(|(media_id, event_id)| media_events::ActiveModel {
                        media_id: Set(media_id),
                        event_id: Set(event_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );
        counts.insert(
            "individual_sources".to_string(),
            insert_edges(
                self.txn,
                individual_source_rows
                    .into_iter()
                    .map(|(individual_id, source_id)| individual_sources::ActiveModel {
                        individual_id: Set(individual_id),
                        source_id: Set(source_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );
        counts.insert(
            "family_sources".to_string(),
            insert_edges(
                self.txn,
                family_source_rows
                    .into_iter()
                    .map(|(family_id, source_id)| family_sources::ActiveModel {
                        family_id: Set(family_id),
                        source_id: Set(source_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );
        counts.insert(
            "individual_notes".to_string(),
            insert_edges(
                self.txn,
                individual_note_rows
                    .into_iter()
                    .map(|(individual_id, note_id)| individual_notes::ActiveModel {
                        individual_id: Set(individual_id),
                        note_id: Set(note_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );
        counts.insert(
            "family_notes".to_string(),
            insert_edges(
                self.txn,
                family_note_rows
                    .into_iter()
                    .map(|(family_id, note_id)| family_notes::ActiveModel {
                        family_id: Set(family_id),
                        note_id: Set(note_id),
                    })
                    .collect(),
            )
            .await? as usize,
        );

        if dropped > 0 {
            info!("Dropped {} relationship pairs with unknown endpoints", dropped);
        }
        self.summary.skipped_relationships += dropped;
        self.summary.relationships = counts;
        Ok(())
    }

    /// Profile images can only be linked once both individuals and media exist.
    async fn restore_profile_images(&mut self, records: &[IndividualRecord]) -> Result<(), DbErr> {
        let mut linked = HashSet::new();
        for record in records {
            if !linked.insert(record.id) {
                continue;
            }
            let Some(old_media_id) = record.profile_image_id else {
                continue;
            };
            let (Some(individual_id), Some(media_id)) = (
                self.maps.individuals.get(&record.id).copied(),
                self.maps.media.get(&old_media_id).copied(),
            ) else {
                debug!(
                    "Profile image {} of individual {} not in archive",
                    old_media_id, record.id
                );
                continue;
            };

            individuals::ActiveModel {
                id: Set(individual_id),
                profile_image_id: Set(Some(media_id)),
                ..Default::default()
            }
            .update(self.txn)
            .await?;
        }
        Ok(())
    }
}

/// Map both ends of each pair. Returns the distinct mapped pairs and how many
/// input pairs had an endpoint missing from its map.
fn remap_pairs(
    pairs: impl Iterator<Item = (i32, i32)>,
    left: &HashMap<i32, i32>,
    right: &HashMap<i32, i32>,
) -> (Vec<(i32, i32)>, usize) {
    let mut seen = HashSet::new();
    let mut mapped = Vec::new();
    let mut dropped = 0;
    for (a, b) in pairs {
        match (left.get(&a), right.get(&b)) {
            (Some(new_a), Some(new_b)) => {
                if seen.insert((*new_a, *new_b)) {
                    mapped.push((*new_a, *new_b));
                }
            }
            _ => dropped += 1,
        }
    }
    (mapped, dropped)
}

// ----- Archive helpers -----

fn write_json_entry<W: Write + std::io::Seek, T: Serialize>(
    zip: &mut ZipWriter<W>,
    path: &str,
    value: &T,
) -> ImportExportResult<()> {
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let bytes = serde_json::to_vec_pretty(value)?;
    zip.start_file(path, options)?;
    zip.write_all(&bytes)?;
    Ok(())
}

fn parse_archive(bytes: &[u8]) -> ImportExportResult<ParsedArchive> {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportExportError::InvalidArchive(format!("not a zip archive: {}", e)))?;

    let manifest: BackupManifest = try_read_archive_json(&mut archive, MANIFEST_PATH)?
        .ok_or_else(|| ImportExportError::InvalidArchive("missing manifest.json".to_string()))?;

    let mut decoder = RecordDecoder::default();
    let individuals: Vec<IndividualRecord> =
        decoder.decode(INDIVIDUALS_PATH, read_archive_json(&mut archive, INDIVIDUALS_PATH)?);
    let families: Vec<FamilyRecord> =
        decoder.decode(FAMILIES_PATH, read_archive_json(&mut archive, FAMILIES_PATH)?);
    let events: Vec<EventRecord> =
        decoder.decode(EVENTS_PATH, read_archive_json(&mut archive, EVENTS_PATH)?);
    let media: Vec<MediaRecord> =
        decoder.decode(MEDIA_PATH, read_archive_json(&mut archive, MEDIA_PATH)?);

    let places: Vec<PlaceRecord> = match try_read_archive_json(&mut archive, PLACES_PATH)? {
        Some(values) => decoder.decode(PLACES_PATH, values),
        None => {
            info!("{} not in archive, no places restored", PLACES_PATH);
            Vec::new()
        }
    };
    let sources: Vec<SourceRecord> = decoder.decode(
        SOURCES_PATH,
        try_read_archive_json(&mut archive, SOURCES_PATH)?.unwrap_or_default(),
    );
    let notes: Vec<NoteRecord> = decoder.decode(
        NOTES_PATH,
        try_read_archive_json(&mut archive, NOTES_PATH)?.unwrap_or_default(),
    );
    let skipped_records = decoder.skipped;

    let raw: RawRelationships = read_archive_json(&mut archive, RELATIONSHIPS_PATH)?;
    decoder.skipped = 0;
    let relationships = RelationshipsRecord {
        individual_events: decoder.decode(RELATIONSHIPS_PATH, raw.individual_events),
        family_events: decoder.decode(RELATIONSHIPS_PATH, raw.family_events),
        child_in_family: decoder.decode(RELATIONSHIPS_PATH, raw.child_in_family),
        media_individuals: decoder.decode(RELATIONSHIPS_PATH, raw.media_individuals),
        media_events: decoder.decode(RELATIONSHIPS_PATH, raw.media_events),
        individual_sources: decoder.decode(RELATIONSHIPS_PATH, raw.individual_sources),
        family_sources: decoder.decode(RELATIONSHIPS_PATH, raw.family_sources),
        individual_notes: decoder.decode(RELATIONSHIPS_PATH, raw.individual_notes),
        family_notes: decoder.decode(RELATIONSHIPS_PATH, raw.family_notes),
    };
    let skipped_relationships = decoder.skipped;

    let mut blobs = Vec::new();
    let mut warnings = decoder.warnings;
    let mut wanted = HashSet::new();
    for record in &media {
        for path in record.blob_paths() {
            if !wanted.insert(path.to_string()) {
                continue;
            }
            match read_zip_file_bytes(&mut archive, &format!("media/{}", path)) {
                Ok(Some(data)) => blobs.push((path.to_string(), data)),
                Ok(None) => {
                    warn!("Media file not found in backup: {}", path);
                    warnings.push(format!("Media file not found in backup: {}", path));
                }
                Err(e) => {
                    warn!("Could not read media file {}: {}", path, e);
                    warnings.push(format!("Could not read media file {}: {}", path, e));
                }
            }
        }
    }

    Ok(ParsedArchive {
        manifest,
        individuals,
        families,
        events,
        media,
        places,
        sources,
        notes,
        relationships,
        blobs,
        warnings,
        skipped_records,
        skipped_relationships,
    })
}

fn read_archive_json<T: DeserializeOwned>(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    path: &str,
) -> ImportExportResult<T> {
    try_read_archive_json(archive, path)?
        .ok_or_else(|| ImportExportError::InvalidArchive(format!("missing {}", path)))
}

fn try_read_archive_json<T: DeserializeOwned>(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    path: &str,
) -> ImportExportResult<Option<T>> {
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer).map_err(|e| {
                ImportExportError::InvalidArchive(format!("could not read {}: {}", path, e))
            })?;
            let parsed = serde_json::from_slice(&buffer).map_err(|source| {
                ImportExportError::MalformedData {
                    path: path.to_string(),
                    source,
                }
            })?;
            Ok(Some(parsed))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(ImportExportError::InvalidArchive(format!(
            "could not open {}: {}",
            path, e
        ))),
    }
}

/// Raw bytes of one entry; `None` when the entry is absent.
fn read_zip_file_bytes(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    path: &str,
) -> Result<Option<Vec<u8>>, std::io::Error> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(Some(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_pairs_drops_unknown_and_duplicates() {
        let left: HashMap<i32, i32> = [(1, 101), (2, 102)].into_iter().collect();
        let right: HashMap<i32, i32> = [(7, 207)].into_iter().collect();

        let (mapped, dropped) =
            remap_pairs(vec![(1, 7), (2, 7), (1, 7), (3, 7), (1, 8)].into_iter(), &left, &right);

        assert_eq!(mapped, vec![(101, 207), (102, 207)]);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_relationships_accept_missing_lists() {
        let parsed: RelationshipsRecord =
            serde_json::from_str(r#"{"individual_events": [{"individual_id": 1, "event_id": 2}]}"#)
                .unwrap();
        assert_eq!(parsed.individual_events.len(), 1);
        assert!(parsed.family_notes.is_empty());
    }

    #[test]
    fn test_legacy_records_parse() {
        let manifest: BackupManifest = serde_json::from_str(
            r#"{"export_date": "2024-03-01T10:00:00.123456", "version": "1.0",
                "counts": {"individuals": 2, "families": 1, "events": 3, "media": 0, "places": 1}}"#,
        )
        .unwrap();
        assert_eq!(manifest.counts.individuals, 2);
        assert_eq!(manifest.counts.sources, 0);

        let media: MediaRecord = serde_json::from_str(
            r#"{"id": 4, "filename": "a.jpg", "file_path": "2024/a.jpg", "media_type": "image/jpeg",
                "file_size": 1024, "media_date": "1950-06-01", "description": null, "extracted_text": null}"#,
        )
        .unwrap();
        assert_eq!(media.thumbnail_path, None);
        assert_eq!(media.media_date, NaiveDate::from_ymd_opt(1950, 6, 1));

        let place: PlaceRecord =
            serde_json::from_str(r#"{"id": 1, "name": "Springfield", "latitude": 1.5, "longitude": 2.5, "geocoded": -1}"#)
                .unwrap();
        assert_eq!(GeocodeStatus::from_code(place.geocoded), GeocodeStatus::Failed);
    }

    #[test]
    fn test_decoder_skips_bad_records() {
        let mut decoder = RecordDecoder::default();
        let values = vec![
            serde_json::json!({"id": 1, "event_type": "BIRT"}),
            serde_json::json!({"event_type": "DEAT"}),
            serde_json::json!({"id": 3, "event_type": null}),
        ];
        let events: Vec<EventRecord> = decoder.decode(EVENTS_PATH, values);

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, None);
        assert_eq!(decoder.skipped, 1);
        assert!(decoder.warnings[0].starts_with("Skipped record 1 in data/events.json"));
    }

    #[test]
    fn test_parse_archive_requires_manifest() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            write_json_entry(&mut zip, INDIVIDUALS_PATH, &Vec::<IndividualRecord>::new()).unwrap();
            zip.finish().unwrap();
        }
        let err = parse_archive(cursor.get_ref()).err().unwrap();
        assert!(matches!(err, ImportExportError::InvalidArchive(_)));
        assert!(err.to_string().contains("manifest.json"));
    }

    #[test]
    fn test_parse_archive_rejects_non_zip() {
        let err = parse_archive(b"definitely not a zip").err().unwrap();
        assert!(err.is_client_error());
    }
}
