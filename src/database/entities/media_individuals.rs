use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media_individuals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub media_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub individual_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::media::Entity",
        from = "Column::MediaId",
        to = "super::media::Column::Id",
        on_delete = "Cascade"
    )]
    Media,
    #[sea_orm(
        belongs_to = "super::individuals::Entity",
        from = "Column::IndividualId",
        to = "super::individuals::Column::Id",
        on_delete = "Cascade"
    )]
    Individuals,
}

impl Related<super::media::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Media.def()
    }
}

impl Related<super::individuals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Individuals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
