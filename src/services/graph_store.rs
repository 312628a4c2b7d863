use std::collections::{BTreeMap, HashMap};

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::database::entities::{
    child_in_family, events, families, family_events, family_notes, family_sources,
    individual_events, individual_notes, individual_sources, individuals, media, media_events,
    media_individuals, notes, places, sources,
};

/// Rows per multi-row INSERT, well under SQLite's bound-parameter limit.
const EDGE_BATCH: usize = 250;

/// Every entity and edge in the store, loaded up front so an operation works
/// on one consistent snapshot instead of lazy lookups.
#[derive(Debug, Clone, Default)]
pub struct GenealogyGraph {
    pub individuals: Vec<individuals::Model>,
    pub families: Vec<families::Model>,
    pub events: Vec<events::Model>,
    pub media: Vec<media::Model>,
    pub places: Vec<places::Model>,
    pub sources: Vec<sources::Model>,
    pub notes: Vec<notes::Model>,
    pub individual_events: Vec<individual_events::Model>,
    pub family_events: Vec<family_events::Model>,
    pub child_in_family: Vec<child_in_family::Model>,
    pub media_individuals: Vec<media_individuals::Model>,
    pub media_events: Vec<media_events::Model>,
    pub individual_sources: Vec<individual_sources::Model>,
    pub family_sources: Vec<family_sources::Model>,
    pub individual_notes: Vec<individual_notes::Model>,
    pub family_notes: Vec<family_notes::Model>,
}

/// Per-kind entity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub individuals: usize,
    pub families: usize,
    pub events: usize,
    pub media: usize,
    pub places: usize,
    #[serde(default)]
    pub sources: usize,
    #[serde(default)]
    pub notes: usize,
}

/// Per-edge-set counts, keyed by the relationship list name.
pub type RelationshipCounts = BTreeMap<String, usize>;

impl GenealogyGraph {
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self, DbErr> {
        Ok(Self {
            individuals: individuals::Entity::find()
                .order_by_asc(individuals::Column::Id)
                .all(conn)
                .await?,
            families: families::Entity::find()
                .order_by_asc(families::Column::Id)
                .all(conn)
                .await?,
            events: events::Entity::find()
                .order_by_asc(events::Column::Id)
                .all(conn)
                .await?,
            media: media::Entity::find()
                .order_by_asc(media::Column::Id)
                .all(conn)
                .await?,
            places: places::Entity::find()
                .order_by_asc(places::Column::Id)
                .all(conn)
                .await?,
            sources: sources::Entity::find()
                .order_by_asc(sources::Column::Id)
                .all(conn)
                .await?,
            notes: notes::Entity::find()
                .order_by_asc(notes::Column::Id)
                .all(conn)
                .await?,
            individual_events: individual_events::Entity::find().all(conn).await?,
            family_events: family_events::Entity::find().all(conn).await?,
            child_in_family: child_in_family::Entity::find().all(conn).await?,
            media_individuals: media_individuals::Entity::find().all(conn).await?,
            media_events: media_events::Entity::find().all(conn).await?,
            individual_sources: individual_sources::Entity::find().all(conn).await?,
            family_sources: family_sources::Entity::find().all(conn).await?,
            individual_notes: individual_notes::Entity::find().all(conn).await?,
            family_notes: family_notes::Entity::find().all(conn).await?,
        })
    }

    pub fn counts(&self) -> GraphCounts {
        GraphCounts {
            individuals: self.individuals.len(),
            families: self.families.len(),
            events: self.events.len(),
            media: self.media.len(),
            places: self.places.len(),
            sources: self.sources.len(),
            notes: self.notes.len(),
        }
    }

    pub fn relationship_counts(&self) -> RelationshipCounts {
        [
            ("individual_events", self.individual_events.len()),
            ("family_events", self.family_events.len()),
            ("child_in_family", self.child_in_family.len()),
            ("media_individuals", self.media_individuals.len()),
            ("media_events", self.media_events.len()),
            ("individual_sources", self.individual_sources.len()),
            ("family_sources", self.family_sources.len()),
            ("individual_notes", self.individual_notes.len()),
            ("family_notes", self.family_notes.len()),
        ]
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect()
    }
}

/// Group `(owner, target)` pairs by owner, targets ascending.
pub fn group_pairs(pairs: impl IntoIterator<Item = (i32, i32)>) -> HashMap<i32, Vec<i32>> {
    let mut grouped: HashMap<i32, Vec<i32>> = HashMap::new();
    for (owner, target) in pairs {
        grouped.entry(owner).or_default().push(target);
    }
    for targets in grouped.values_mut() {
        targets.sort_unstable();
        targets.dedup();
    }
    grouped
}

/// Entity counts straight from the tables.
pub async fn count_entities<C: ConnectionTrait>(conn: &C) -> Result<GraphCounts, DbErr> {
    Ok(GraphCounts {
        individuals: individuals::Entity::find().count(conn).await? as usize,
        families: families::Entity::find().count(conn).await? as usize,
        events: events::Entity::find().count(conn).await? as usize,
        media: media::Entity::find().count(conn).await? as usize,
        places: places::Entity::find().count(conn).await? as usize,
        sources: sources::Entity::find().count(conn).await? as usize,
        notes: notes::Entity::find().count(conn).await? as usize,
    })
}

/// Delete every edge, then every entity. Run it on a transaction: the caller
/// decides whether the wipe is committed.
pub async fn clear_graph<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    individual_events::Entity::delete_many().exec(conn).await?;
    family_events::Entity::delete_many().exec(conn).await?;
    child_in_family::Entity::delete_many().exec(conn).await?;
    media_individuals::Entity::delete_many().exec(conn).await?;
    media_events::Entity::delete_many().exec(conn).await?;
    individual_sources::Entity::delete_many().exec(conn).await?;
    family_sources::Entity::delete_many().exec(conn).await?;
    individual_notes::Entity::delete_many().exec(conn).await?;
    family_notes::Entity::delete_many().exec(conn).await?;

    // Families before individuals so the spouse SET NULL has nothing to touch.
    families::Entity::delete_many().exec(conn).await?;
    individuals::Entity::delete_many().exec(conn).await?;
    events::Entity::delete_many().exec(conn).await?;
    media::Entity::delete_many().exec(conn).await?;
    places::Entity::delete_many().exec(conn).await?;
    sources::Entity::delete_many().exec(conn).await?;
    notes::Entity::delete_many().exec(conn).await?;

    Ok(())
}

/// Bulk insert edge rows. Callers dedupe first: a repeated pair violates the
/// composite primary key.
pub async fn insert_edges<C, A>(conn: &C, rows: Vec<A>) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
    A: ActiveModelTrait,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    let mut remaining = rows;
    let mut inserted = 0;
    while !remaining.is_empty() {
        let rest = remaining.split_off(remaining.len().min(EDGE_BATCH));
        let batch = std::mem::replace(&mut remaining, rest);
        inserted += <A::Entity as EntityTrait>::insert_many(batch)
            .exec_without_returning(conn)
            .await?;
    }
    Ok(inserted)
}
