use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Parent/child link: `child_id` is a child of the spouses of `family_id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "child_in_family")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub child_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub family_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::individuals::Entity",
        from = "Column::ChildId",
        to = "super::individuals::Column::Id",
        on_delete = "Cascade"
    )]
    Individuals,
    #[sea_orm(
        belongs_to = "super::families::Entity",
        from = "Column::FamilyId",
        to = "super::families::Column::Id",
        on_delete = "Cascade"
    )]
    Families,
}

impl Related<super::individuals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Individuals.def()
    }
}

impl Related<super::families::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Families.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
