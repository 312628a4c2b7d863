use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Metadata for a stored blob. `file_path` is the object key in the media
/// bucket; the bytes themselves live in the blob store.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub filename: String,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub media_type: Option<String>,
    pub file_size: Option<i64>,
    pub media_date: Option<Date>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub extracted_text: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::media_individuals::Entity")]
    MediaIndividuals,
    #[sea_orm(has_many = "super::media_events::Entity")]
    MediaEvents,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Every blob key this record owns, main file first.
    pub fn blob_paths(&self) -> Vec<&str> {
        let mut paths = vec![self.file_path.as_str()];
        if let Some(thumbnail) = self.thumbnail_path.as_deref() {
            if !thumbnail.is_empty() && thumbnail != self.file_path {
                paths.push(thumbnail);
            }
        }
        paths
    }
}
