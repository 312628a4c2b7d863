use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "individual_sources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub individual_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::individuals::Entity",
        from = "Column::IndividualId",
        to = "super::individuals::Column::Id",
        on_delete = "Cascade"
    )]
    Individuals,
    #[sea_orm(
        belongs_to = "super::sources::Entity",
        from = "Column::SourceId",
        to = "super::sources::Column::Id",
        on_delete = "Cascade"
    )]
    Sources,
}

impl Related<super::individuals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Individuals.def()
    }
}

impl Related<super::sources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sources.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
