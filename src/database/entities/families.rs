use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A couple and their children. Either spouse slot may be empty; when both
/// are filled they point at two different individuals.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "families")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub gedcom_id: Option<String>,
    pub spouse1_id: Option<i32>,
    pub spouse2_id: Option<i32>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::individuals::Entity",
        from = "Column::Spouse1Id",
        to = "super::individuals::Column::Id",
        on_delete = "SetNull"
    )]
    Spouse1,
    #[sea_orm(
        belongs_to = "super::individuals::Entity",
        from = "Column::Spouse2Id",
        to = "super::individuals::Column::Id",
        on_delete = "SetNull"
    )]
    Spouse2,
    #[sea_orm(has_many = "super::family_events::Entity")]
    FamilyEvents,
    #[sea_orm(has_many = "super::child_in_family::Entity")]
    ChildInFamily,
}

impl Related<super::events::Entity> for Entity {
    fn to() -> RelationDef {
        super::family_events::Relation::Events.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::family_events::Relation::Families.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn spouse_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.spouse1_id.into_iter().chain(self.spouse2_id)
    }
}
