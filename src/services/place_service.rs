use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::entities::events;
use crate::database::entities::places::{self, GeocodeStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub pending: u64,
    /// Distinct event places with no place row yet.
    pub unsynced: u64,
}

pub struct PlaceService {
    db: DatabaseConnection,
}

impl PlaceService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a pending place for every event place name not yet known.
    /// Returns how many were added.
    pub async fn sync_places_from_events(&self) -> Result<usize, DbErr> {
        let txn = self.db.begin().await?;
        let added = sync_places(&txn).await?;
        txn.commit().await?;
        info!("Place sync added {} places", added);
        Ok(added)
    }

    pub async fn stats(&self) -> Result<PlaceStats, DbErr> {
        let total = places::Entity::find().count(&self.db).await?;
        let success = count_with_status(&self.db, GeocodeStatus::Success).await?;
        let failed = count_with_status(&self.db, GeocodeStatus::Failed).await?;
        let pending = count_with_status(&self.db, GeocodeStatus::Pending).await?;

        let known = known_place_names(&self.db).await?;
        let unsynced = event_place_names(&self.db)
            .await?
            .iter()
            .filter(|name| !known.contains(*name))
            .count() as u64;

        Ok(PlaceStats {
            total,
            success,
            failed,
            pending,
            unsynced,
        })
    }
}

/// Place sync on an existing connection or transaction.
pub async fn sync_places<C: ConnectionTrait>(conn: &C) -> Result<usize, DbErr> {
    let known = known_place_names(conn).await?;
    let now = Utc::now();
    let mut added = 0;

    for name in event_place_names(conn).await? {
        if known.contains(&name) {
            continue;
        }
        debug!("Adding pending place {}", name);
        places::ActiveModel {
            name: Set(name),
            latitude: Set(None),
            longitude: Set(None),
            geocode_status: Set(GeocodeStatus::Pending.into()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        added += 1;
    }

    Ok(added)
}

/// Distinct, trimmed, non-empty event place names in sorted order.
async fn event_place_names<C: ConnectionTrait>(conn: &C) -> Result<BTreeSet<String>, DbErr> {
    let raw: Vec<Option<String>> = events::Entity::find()
        .select_only()
        .column(events::Column::Place)
        .filter(events::Column::Place.is_not_null())
        .distinct()
        .into_tuple()
        .all(conn)
        .await?;

    Ok(raw
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

async fn known_place_names<C: ConnectionTrait>(conn: &C) -> Result<HashSet<String>, DbErr> {
    let names: Vec<String> = places::Entity::find()
        .select_only()
        .column(places::Column::Name)
        .into_tuple()
        .all(conn)
        .await?;
    Ok(names.into_iter().collect())
}

async fn count_with_status<C: ConnectionTrait>(
    conn: &C,
    status: GeocodeStatus,
) -> Result<u64, DbErr> {
    places::Entity::find()
        .filter(places::Column::GeocodeStatus.eq(status.as_str()))
        .count(conn)
        .await
}
