use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::graph_store::{clear_graph, group_pairs, insert_edges, GenealogyGraph};
use super::place_service::sync_places;
use super::{ImportPass, SkippedRecord};
use crate::database::entities::events::EventType;
use crate::database::entities::individuals::Sex;
use crate::database::entities::{
    child_in_family, events, families, family_events, family_notes, family_sources,
    individual_events, individual_notes, individual_sources, individuals, notes, sources,
};
use crate::errors::{ImportExportError, ImportExportResult};
use crate::gedcom::{
    format_name, parse_date, Element, GedcomDocument, GedcomWriter, NoteRef, Tag,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GedcomImportOptions {
    /// Clear the whole graph (in the import transaction) before pass 1.
    #[serde(default)]
    pub replace_existing: bool,
}

/// What an import created, plus every record it dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GedcomImportSummary {
    pub individuals: usize,
    pub families: usize,
    pub sources: usize,
    pub notes: usize,
    pub births: usize,
    pub deaths: usize,
    pub burials: usize,
    pub marriages: usize,
    pub children_linked: usize,
    pub places_added: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl GedcomImportSummary {
    fn count_event(&mut self, kind: EventType) {
        match kind {
            EventType::Birth => self.births += 1,
            EventType::Death => self.deaths += 1,
            EventType::Burial => self.burials += 1,
            EventType::Marriage => self.marriages += 1,
        }
    }

    pub fn events(&self) -> usize {
        self.births + self.deaths + self.burials + self.marriages
    }
}

pub struct GedcomService {
    db: DatabaseConnection,
}

impl GedcomService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Import a GEDCOM document in one transaction.
    ///
    /// Passes run in a fixed order, each only referencing what earlier passes
    /// created: sources and notes, individuals, families (with children),
    /// individual events, family events. Bad records are skipped and listed in
    /// the summary; a database error rolls the whole import back.
    pub async fn import_gedcom(
        &self,
        bytes: &[u8],
        options: GedcomImportOptions,
    ) -> ImportExportResult<GedcomImportSummary> {
        let document = GedcomDocument::parse(bytes);
        if document.top_level_count() == 0 {
            return Err(ImportExportError::EmptyDocument);
        }

        info!(
            "Importing GEDCOM: {} individuals, {} families, {} sources, {} notes",
            document.individuals().count(),
            document.families().count(),
            document.sources().count(),
            document.notes().count()
        );

        let txn = self.db.begin().await?;

        if options.replace_existing {
            info!("Clearing existing graph before import");
            clear_graph(&txn).await?;
        }

        let mut importer = GedcomImporter::new(&txn).await?;
        importer.import_sources(&document).await?;
        importer.import_notes(&document).await?;
        let individual_ids = importer.import_individuals(&document).await?;
        let family_ids = importer.import_families(&document).await?;
        importer
            .import_individual_events(&document, &individual_ids)
            .await?;
        importer.import_family_events(&document, &family_ids).await?;

        let mut summary = importer.summary;
        summary.places_added = sync_places(&txn).await?;

        txn.commit().await?;

        info!(
            "GEDCOM import complete: {} individuals, {} families, {} events ({} births, {} deaths, {} burials, {} marriages), {} children linked, {} places added, {} skipped",
            summary.individuals,
            summary.families,
            summary.events(),
            summary.births,
            summary.deaths,
            summary.burials,
            summary.marriages,
            summary.children_linked,
            summary.places_added,
            summary.skipped.len()
        );

        Ok(summary)
    }

    /// Render the current graph as a GEDCOM 5.5.1 document.
    pub async fn export_gedcom(&self) -> ImportExportResult<String> {
        let graph = GenealogyGraph::load(&self.db).await?;
        let document = write_gedcom(&graph, Utc::now().date_naive());
        info!(
            "Exported GEDCOM with {} individuals and {} families",
            graph.individuals.len(),
            graph.families.len()
        );
        Ok(document)
    }
}

/// Pointers already stored, per record kind, so a re-used pointer is a
/// skipped record instead of a unique-constraint failure.
#[derive(Default)]
struct ExistingPointers {
    individuals: HashSet<String>,
    families: HashSet<String>,
    sources: HashSet<String>,
    notes: HashSet<String>,
}

impl ExistingPointers {
    async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self, DbErr> {
        Ok(Self {
            individuals: collect_ids(
                individuals::Entity::find()
                    .select_only()
                    .column(individuals::Column::GedcomId)
                    .into_tuple()
                    .all(conn)
                    .await?,
            ),
            families: collect_ids(
                families::Entity::find()
                    .select_only()
                    .column(families::Column::GedcomId)
                    .into_tuple()
                    .all(conn)
                    .await?,
            ),
            sources: collect_ids(
                sources::Entity::find()
                    .select_only()
                    .column(sources::Column::GedcomId)
                    .into_tuple()
                    .all(conn)
                    .await?,
            ),
            notes: collect_ids(
                notes::Entity::find()
                    .select_only()
                    .column(notes::Column::GedcomId)
                    .into_tuple()
                    .all(conn)
                    .await?,
            ),
        })
    }
}

fn collect_ids(ids: Vec<Option<String>>) -> HashSet<String> {
    ids.into_iter().flatten().collect()
}

/// Decide the `gedcom_id` a new record may use.
fn claim_pointer(
    pointer: Option<&str>,
    stored: &HashSet<String>,
    imported: &HashMap<String, i32>,
) -> Result<Option<String>, String> {
    match pointer {
        None => Ok(None),
        Some(pointer) if imported.contains_key(pointer) => {
            Err(format!("pointer {} appears more than once in the file", pointer))
        }
        Some(pointer) if stored.contains(pointer) => {
            Err(format!("pointer {} already exists in the store", pointer))
        }
        Some(pointer) => Ok(Some(pointer.to_string())),
    }
}

fn record_label(element: &Element) -> String {
    element
        .pointer
        .clone()
        .unwrap_or_else(|| format!("line {}", element.line_number))
}

struct GedcomImporter<'a> {
    txn: &'a DatabaseTransaction,
    now: DateTime<Utc>,
    existing: ExistingPointers,
    individual_map: HashMap<String, i32>,
    family_map: HashMap<String, i32>,
    source_map: HashMap<String, i32>,
    note_map: HashMap<String, i32>,
    summary: GedcomImportSummary,
}

impl<'a> GedcomImporter<'a> {
    async fn new(txn: &'a DatabaseTransaction) -> Result<Self, DbErr> {
        Ok(Self {
            txn,
            now: Utc::now(),
            existing: ExistingPointers::load(txn).await?,
            individual_map: HashMap::new(),
            family_map: HashMap::new(),
            source_map: HashMap::new(),
            note_map: HashMap::new(),
            summary: GedcomImportSummary::default(),
        })
    }

    fn skip(&mut self, pass: ImportPass, record: impl Into<String>, reason: impl Into<String>) {
        let skipped = SkippedRecord::new(pass, record, reason);
        warn!("Skipped record {}", skipped);
        self.summary.skipped.push(skipped);
    }

    async fn import_sources(&mut self, document: &GedcomDocument) -> Result<(), DbErr> {
        for source in document.sources() {
            let label = record_label(&source.0);
            let gedcom_id =
                match claim_pointer(source.pointer(), &self.existing.sources, &self.source_map) {
                    Ok(id) => id,
                    Err(reason) => {
                        self.skip(ImportPass::Sources, label, reason);
                        continue;
                    }
                };

            let model = sources::ActiveModel {
                gedcom_id: Set(gedcom_id.clone()),
                title: Set(source.title()),
                author: Set(source.author()),
                publication_info: Set(source.publication()),
                repository: Set(source.repository()),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;

            if let Some(pointer) = gedcom_id {
                self.source_map.insert(pointer, model.id);
            }
            self.summary.sources += 1;
        }
        debug!("Sources pass created {} sources", self.summary.sources);
        Ok(())
    }

    async fn import_notes(&mut self, document: &GedcomDocument) -> Result<(), DbErr> {
        for note in document.notes() {
            let label = record_label(&note.0);
            let gedcom_id =
                match claim_pointer(note.pointer(), &self.existing.notes, &self.note_map) {
                    Ok(id) => id,
                    Err(reason) => {
                        self.skip(ImportPass::Notes, label, reason);
                        continue;
                    }
                };

            let id = self.create_note(gedcom_id.clone(), note.text()).await?;
            if let Some(pointer) = gedcom_id {
                self.note_map.insert(pointer, id);
            }
        }
        debug!("Notes pass created {} notes", self.summary.notes);
        Ok(())
    }

    async fn create_note(
        &mut self,
        gedcom_id: Option<String>,
        text: Option<String>,
    ) -> Result<i32, DbErr> {
        let model = notes::ActiveModel {
            gedcom_id: Set(gedcom_id),
            text: Set(text),
            created_at: Set(self.now),
            updated_at: Set(self.now),
            ..Default::default()
        }
        .insert(self.txn)
        .await?;
        self.summary.notes += 1;
        Ok(model.id)
    }

    /// Resolve source pointers of one record, skipping unknown ones.
    fn resolve_sources<'p>(
        &mut self,
        pass: ImportPass,
        label: &str,
        pointers: impl Iterator<Item = &'p str>,
    ) -> Vec<i32> {
        let mut ids = Vec::new();
        for pointer in pointers {
            match self.source_map.get(pointer) {
                Some(id) => ids.push(*id),
                None => self.skip(
                    pass,
                    label,
                    format!("SOUR {} does not match any source", pointer),
                ),
            }
        }
        ids
    }

    /// Resolve note references of one record. Inline notes become new notes.
    async fn resolve_notes(
        &mut self,
        pass: ImportPass,
        label: &str,
        refs: Vec<NoteRef>,
    ) -> Result<Vec<i32>, DbErr> {
        let mut ids = Vec::new();
        for note in refs {
            match note {
                NoteRef::Pointer(pointer) => match self.note_map.get(&pointer) {
                    Some(id) => ids.push(*id),
                    None => self.skip(
                        pass,
                        label,
                        format!("NOTE {} does not match any note", pointer),
                    ),
                },
                NoteRef::Inline(text) => ids.push(self.create_note(None, Some(text)).await?),
            }
        }
        Ok(ids)
    }

    fn resolve_individual(
        &mut self,
        pass: ImportPass,
        label: &str,
        role: &str,
        pointer: Option<&str>,
    ) -> Option<i32> {
        let pointer = pointer?;
        let resolved = self.individual_map.get(pointer).copied();
        if resolved.is_none() {
            self.skip(
                pass,
                label,
                format!("{} {} does not match any individual", role, pointer),
            );
        }
        resolved
    }

    /// Pass 1. Returns the new id of each individual element, in document
    /// order, `None` where the record was skipped.
    async fn import_individuals(
        &mut self,
        document: &GedcomDocument,
    ) -> Result<Vec<Option<i32>>, DbErr> {
        let mut ids = Vec::new();
        let mut source_edges = HashSet::new();
        let mut note_edges = HashSet::new();

        for individual in document.individuals() {
            let label = record_label(&individual.0);
            let gedcom_id = match claim_pointer(
                individual.pointer(),
                &self.existing.individuals,
                &self.individual_map,
            ) {
                Ok(id) => id,
                Err(reason) => {
                    self.skip(ImportPass::Individuals, label, reason);
                    ids.push(None);
                    continue;
                }
            };

            let (first_name, last_name) = individual.name();
            let sex = individual.sex().and_then(|raw| {
                let parsed = Sex::parse(raw);
                if parsed.is_none() {
                    debug!("Ignoring unknown SEX value {:?} on {}", raw, label);
                }
                parsed
            });

            let model = individuals::ActiveModel {
                gedcom_id: Set(gedcom_id.clone()),
                first_name: Set(first_name),
                last_name: Set(last_name),
                sex: Set(sex.map(String::from)),
                profile_image_id: Set(None),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;

            debug!("Created individual {} as {}", label, model.id);
            if let Some(pointer) = gedcom_id {
                self.individual_map.insert(pointer, model.id);
            }
            ids.push(Some(model.id));
            self.summary.individuals += 1;

            for source_id in
                self.resolve_sources(ImportPass::Individuals, &label, individual.source_pointers())
            {
                source_edges.insert((model.id, source_id));
            }
            for note_id in self
                .resolve_notes(ImportPass::Individuals, &label, individual.notes())
                .await?
            {
                note_edges.insert((model.id, note_id));
            }
        }

        insert_edges(
            self.txn,
            source_edges
                .into_iter()
                .map(|(individual_id, source_id)| individual_sources::ActiveModel {
                    individual_id: Set(individual_id),
                    source_id: Set(source_id),
                })
                .collect(),
        )
        .await?;
        insert_edges(
            self.txn,
            note_edges
                .into_iter()
                .map(|(individual_id, note_id)| individual_notes::ActiveModel {
                    individual_id: Set(individual_id),
                    note_id: Set(note_id),
                })
                .collect(),
        )
        .await?;

        info!("Individuals pass created {} individuals", self.summary.individuals);
        Ok(ids)
    }

    /// Pass 2: families, spouse slots and child edges.
    async fn import_families(
        &mut self,
        document: &GedcomDocument,
    ) -> Result<Vec<Option<i32>>, DbErr> {
        let mut ids = Vec::new();
        let mut child_edges = HashSet::new();
        let mut source_edges = HashSet::new();
        let mut note_edges = HashSet::new();

        for family in document.families() {
            let label = record_label(&family.0);
            let gedcom_id =
                match claim_pointer(family.pointer(), &self.existing.families, &self.family_map)
                {
                    Ok(id) => id,
                    Err(reason) => {
                        self.skip(ImportPass::Families, label, reason);
                        ids.push(None);
                        continue;
                    }
                };

            let spouse1 =
                self.resolve_individual(ImportPass::Families, &label, "HUSB", family.husband());
            let mut spouse2 =
                self.resolve_individual(ImportPass::Families, &label, "WIFE", family.wife());
            if spouse1.is_some() && spouse1 == spouse2 {
                self.skip(
                    ImportPass::Families,
                    label.clone(),
                    "HUSB and WIFE name the same individual; WIFE dropped",
                );
                spouse2 = None;
            }

            let model = families::ActiveModel {
                gedcom_id: Set(gedcom_id.clone()),
                spouse1_id: Set(spouse1),
                spouse2_id: Set(spouse2),
                created_at: Set(self.now),
                updated_at: Set(self.now),
                ..Default::default()
            }
            .insert(self.txn)
            .await?;

            debug!("Created family {} as {}", label, model.id);
            if let Some(pointer) = gedcom_id {
                self.family_map.insert(pointer, model.id);
            }
            ids.push(Some(model.id));
            self.summary.families += 1;

            for child in family.children() {
                if let Some(child_id) =
                    self.resolve_individual(ImportPass::Families, &label, "CHIL", Some(child))
                {
                    child_edges.insert((child_id, model.id));
                }
            }
            for source_id in
                self.resolve_sources(ImportPass::Families, &label, family.source_pointers())
            {
                source_edges.insert((model.id, source_id));
            }
            for note_id in self
                .resolve_notes(ImportPass::Families, &label, family.notes())
                .await?
            {
                note_edges.insert((model.id, note_id));
            }
        }

        self.summary.children_linked += insert_edges(
            self.txn,
            child_edges
                .into_iter()
                .map(|(child_id, family_id)| child_in_family::ActiveModel {
                    child_id: Set(child_id),
                    family_id: Set(family_id),
                })
                .collect(),
        )
        .await? as usize;
        insert_edges(
            self.txn,
            source_edges
                .into_iter()
                .map(|(family_id, source_id)| family_sources::ActiveModel {
                    family_id: Set(family_id),
                    source_id: Set(source_id),
                })
                .collect(),
        )
        .await?;
        insert_edges(
            self.txn,
            note_edges
                .into_iter()
                .map(|(family_id, note_id)| family_notes::ActiveModel {
                    family_id: Set(family_id),
                    note_id: Set(note_id),
                })
                .collect(),
        )
        .await?;

        info!(
            "Families pass created {} families with {} child links",
            self.summary.families, self.summary.children_linked
        );
        Ok(ids)
    }

    async fn create_event(&mut self, kind: EventType, element: &Element) -> Result<i32, DbErr> {
        let raw_date = element.child_value(&Tag::Date);
        let event_date = raw_date.and_then(parse_date);
        if let (Some(raw), None) = (raw_date, event_date) {
            debug!("Date {:?} on line {} normalized to unknown", raw, element.line_number);
        }

        let model = events::ActiveModel {
            event_type: Set(kind.into()),
            event_date: Set(event_date),
            place: Set(element.child_value(&Tag::Place).map(str::to_string)),
            description: Set(None),
            created_at: Set(self.now),
            updated_at: Set(self.now),
            ..Default::default()
        }
        .insert(self.txn)
        .await?;

        self.summary.count_event(kind);
        Ok(model.id)
    }

    /// Pass 3: BIRT/DEAT/BURI on individuals created in pass 1.
    async fn import_individual_events(
        &mut self,
        document: &GedcomDocument,
        individual_ids: &[Option<i32>],
    ) -> Result<(), DbErr> {
        let mut edges = Vec::new();
        for (individual, id) in document.individuals().zip(individual_ids) {
            let Some(individual_id) = *id else {
                continue;
            };
            for (kind, element) in individual.events() {
                let event_id = self.create_event(kind, element).await?;
                edges.push(individual_events::ActiveModel {
                    individual_id: Set(individual_id),
                    event_id: Set(event_id),
                });
            }
        }
        let linked = insert_edges(self.txn, edges).await?;
        info!("Individual events pass linked {} events", linked);
        Ok(())
    }

    /// Pass 4: MARR on families created in pass 2.
    async fn import_family_events(
        &mut self,
        document: &GedcomDocument,
        family_ids: &[Option<i32>],
    ) -> Result<(), DbErr> {
        let mut edges = Vec::new();
        for (family, id) in document.families().zip(family_ids) {
            let Some(family_id) = *id else {
                continue;
            };
            for element in family.marriages() {
                let event_id = self.create_event(EventType::Marriage, element).await?;
                edges.push(family_events::ActiveModel {
                    family_id: Set(family_id),
                    event_id: Set(event_id),
                });
            }
        }
        let linked = insert_edges(self.txn, edges).await?;
        info!("Family events pass linked {} events", linked);
        Ok(())
    }
}

/// Write `graph` as GEDCOM. Pointers are assigned in ascending id order;
/// linked events are written in ascending event id order.
pub fn write_gedcom(graph: &GenealogyGraph, today: NaiveDate) -> String {
    let individual_ptrs: HashMap<i32, String> = graph
        .individuals
        .iter()
        .enumerate()
        .map(|(index, individual)| (individual.id, format!("@I{}@", index + 1)))
        .collect();
    let family_ptrs: HashMap<i32, String> = graph
        .families
        .iter()
        .enumerate()
        .map(|(index, family)| (family.id, format!("@F{}@", index + 1)))
        .collect();
    let source_ptrs: HashMap<i32, String> = graph
        .sources
        .iter()
        .enumerate()
        .map(|(index, source)| (source.id, format!("@S{}@", index + 1)))
        .collect();
    let note_ptrs: HashMap<i32, String> = graph
        .notes
        .iter()
        .enumerate()
        .map(|(index, note)| (note.id, format!("@N{}@", index + 1)))
        .collect();

    let events_by_id: HashMap<i32, &events::Model> =
        graph.events.iter().map(|event| (event.id, event)).collect();
    let individual_events = group_pairs(
        graph
            .individual_events
            .iter()
            .map(|edge| (edge.individual_id, edge.event_id)),
    );
    let family_events = group_pairs(
        graph
            .family_events
            .iter()
            .map(|edge| (edge.family_id, edge.event_id)),
    );
    let children_of = group_pairs(
        graph
            .child_in_family
            .iter()
            .map(|edge| (edge.family_id, edge.child_id)),
    );
    let families_as_child = group_pairs(
        graph
            .child_in_family
            .iter()
            .map(|edge| (edge.child_id, edge.family_id)),
    );
    let families_as_spouse = group_pairs(
        graph
            .families
            .iter()
            .flat_map(|family| family.spouse_ids().map(move |spouse| (spouse, family.id))),
    );
    let individual_sources = group_pairs(
        graph
            .individual_sources
            .iter()
            .map(|edge| (edge.individual_id, edge.source_id)),
    );
    let family_sources = group_pairs(
        graph
            .family_sources
            .iter()
            .map(|edge| (edge.family_id, edge.source_id)),
    );
    let individual_notes = group_pairs(
        graph
            .individual_notes
            .iter()
            .map(|edge| (edge.individual_id, edge.note_id)),
    );
    let family_notes = group_pairs(
        graph
            .family_notes
            .iter()
            .map(|edge| (edge.family_id, edge.note_id)),
    );

    let mut writer = GedcomWriter::new();
    writer.header(env!("CARGO_PKG_VERSION"), &today);

    let write_events = |writer: &mut GedcomWriter, ids: Option<&Vec<i32>>, allowed: &[EventType]| {
        for event in ids
            .into_iter()
            .flatten()
            .filter_map(|id| events_by_id.get(id))
        {
            let Some(kind) = event.get_event_type() else {
                continue;
            };
            if !allowed.contains(&kind) {
                continue;
            }
            writer
                .tag(1, kind.tag())
                .date(2, event.event_date.as_ref())
                .optional(2, "PLAC", event.place.as_deref());
        }
    };

    let write_pointers =
        |writer: &mut GedcomWriter, tag: &str, ids: Option<&Vec<i32>>, ptrs: &HashMap<i32, String>| {
            for ptr in ids.into_iter().flatten().filter_map(|id| ptrs.get(id)) {
                writer.line(1, tag, ptr);
            }
        };

    for individual in &graph.individuals {
        let ptr = &individual_ptrs[&individual.id];
        writer.record(ptr, "INDI");
        let name = format_name(
            individual.first_name.as_deref(),
            individual.last_name.as_deref(),
        );
        writer.optional(1, "NAME", Some(name.as_str()));
        writer.optional(1, "SEX", individual.sex.as_deref());
        write_events(
            &mut writer,
            individual_events.get(&individual.id),
            &EventType::INDIVIDUAL,
        );
        write_pointers(&mut writer, "FAMS", families_as_spouse.get(&individual.id), &family_ptrs);
        write_pointers(&mut writer, "FAMC", families_as_child.get(&individual.id), &family_ptrs);
        write_pointers(&mut writer, "SOUR", individual_sources.get(&individual.id), &source_ptrs);
        write_pointers(&mut writer, "NOTE", individual_notes.get(&individual.id), &note_ptrs);
    }

    for family in &graph.families {
        let ptr = &family_ptrs[&family.id];
        writer.record(ptr, "FAM");
        if let Some(husband) = family.spouse1_id.and_then(|id| individual_ptrs.get(&id)) {
            writer.line(1, "HUSB", husband);
        }
        if let Some(wife) = family.spouse2_id.and_then(|id| individual_ptrs.get(&id)) {
            writer.line(1, "WIFE", wife);
        }
        write_pointers(&mut writer, "CHIL", children_of.get(&family.id), &individual_ptrs);
        write_events(
            &mut writer,
            family_events.get(&family.id),
            &[EventType::Marriage],
        );
        write_pointers(&mut writer, "SOUR", family_sources.get(&family.id), &source_ptrs);
        write_pointers(&mut writer, "NOTE", family_notes.get(&family.id), &note_ptrs);
    }

    for source in &graph.sources {
        writer.record(&source_ptrs[&source.id], "SOUR");
        writer
            .optional(1, "TITL", source.title.as_deref())
            .optional(1, "AUTH", source.author.as_deref())
            .optional(1, "PUBL", source.publication_info.as_deref())
            .optional(1, "REPO", source.repository.as_deref());
    }

    for note in &graph.notes {
        let ptr = &note_ptrs[&note.id];
        match note.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => writer.line(0, &format!("{} NOTE", ptr), text),
            None => writer.record(ptr, "NOTE"),
        };
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: i32, first: &str, last: &str, sex: &str) -> individuals::Model {
        individuals::Model {
            id,
            gedcom_id: None,
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            sex: Some(sex.to_string()),
            profile_image_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn event(id: i32, kind: EventType, date: Option<NaiveDate>, place: &str) -> events::Model {
        events::Model {
            id,
            event_type: kind.into(),
            event_date: date,
            place: Some(place.to_string()),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_claim_pointer() {
        let stored: HashSet<String> = ["@I1@".to_string()].into_iter().collect();
        let mut imported = HashMap::new();
        imported.insert("@I2@".to_string(), 7);

        assert_eq!(claim_pointer(None, &stored, &imported), Ok(None));
        assert_eq!(
            claim_pointer(Some("@I3@"), &stored, &imported),
            Ok(Some("@I3@".to_string()))
        );
        assert!(claim_pointer(Some("@I1@"), &stored, &imported)
            .unwrap_err()
            .contains("already exists"));
        assert!(claim_pointer(Some("@I2@"), &stored, &imported)
            .unwrap_err()
            .contains("more than once"));
    }

    #[test]
    fn test_write_gedcom_assigns_pointers_by_id() {
        let birth = NaiveDate::from_ymd_opt(1900, 1, 1);
        let graph = GenealogyGraph {
            individuals: vec![person(10, "John", "Doe", "M"), person(20, "Jane", "Doe", "F")],
            families: vec![families::Model {
                id: 5,
                gedcom_id: None,
                spouse1_id: Some(10),
                spouse2_id: Some(20),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }],
            events: vec![event(3, EventType::Birth, birth, "Springfield")],
            individual_events: vec![individual_events::Model {
                individual_id: 10,
                event_id: 3,
            }],
            ..Default::default()
        };

        let text = write_gedcom(&graph, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "0 HEAD");
        assert_eq!(*lines.last().unwrap(), "0 TRLR");
        let john = lines.iter().position(|l| *l == "0 @I1@ INDI").unwrap();
        assert_eq!(lines[john + 1], "1 NAME John /Doe/");
        assert_eq!(lines[john + 2], "1 SEX M");
        assert_eq!(lines[john + 3], "1 BIRT");
        assert_eq!(lines[john + 4], "2 DATE 01 JAN 1900");
        assert_eq!(lines[john + 5], "2 PLAC Springfield");
        assert_eq!(lines[john + 6], "1 FAMS @F1@");
        assert!(lines.contains(&"0 @I2@ INDI"));
        assert!(lines.contains(&"1 HUSB @I1@"));
        assert!(lines.contains(&"1 WIFE @I2@"));
    }
}
