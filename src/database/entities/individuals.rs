use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A person in the tree.
///
/// `gedcom_id` is the pointer the record was imported under (e.g. `@I1@`).
/// It is unique when present and meaningless outside the file it came from.
/// `profile_image_id` is a weak reference to a media row: no foreign key, and
/// it is only ever used for lookups.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "individuals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub gedcom_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sex: Option<String>,
    pub profile_image_id: Option<i32>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::individual_events::Entity")]
    IndividualEvents,
    #[sea_orm(has_many = "super::child_in_family::Entity")]
    ChildInFamily,
    #[sea_orm(has_many = "super::media_individuals::Entity")]
    MediaIndividuals,
}

impl Related<super::events::Entity> for Entity {
    fn to() -> RelationDef {
        super::individual_events::Relation::Events.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::individual_events::Relation::Individuals.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    /// Parse a GEDCOM `SEX` value. Anything outside `M`/`F`/`U` is treated as absent.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "M" => Some(Sex::Male),
            "F" => Some(Sex::Female),
            "U" => Some(Sex::Unknown),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unknown => "U",
        }
    }
}

impl From<Sex> for String {
    fn from(sex: Sex) -> Self {
        sex.as_code().to_string()
    }
}

impl Model {
    pub fn get_sex(&self) -> Option<Sex> {
        self.sex.as_deref().and_then(Sex::parse)
    }

    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        format!("{} {}", first, last).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_parse() {
        assert_eq!(Sex::parse("m"), Some(Sex::Male));
        assert_eq!(Sex::parse(" F "), Some(Sex::Female));
        assert_eq!(Sex::parse("U"), Some(Sex::Unknown));
        assert_eq!(Sex::parse("X"), None);
        assert_eq!(Sex::parse(""), None);
    }
}
