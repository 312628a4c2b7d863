use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub event_type: String,
    pub event_date: Option<Date>,
    pub place: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::individual_events::Entity")]
    IndividualEvents,
    #[sea_orm(has_many = "super::family_events::Entity")]
    FamilyEvents,
    #[sea_orm(has_many = "super::media_events::Entity")]
    MediaEvents,
}

impl ActiveModelBehavior for ActiveModel {}

/// The event kinds the interchange engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Birth,
    Death,
    Burial,
    Marriage,
}

impl EventType {
    pub const INDIVIDUAL: [EventType; 3] = [EventType::Birth, EventType::Death, EventType::Burial];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "BIRT" => Some(EventType::Birth),
            "DEAT" => Some(EventType::Death),
            "BURI" => Some(EventType::Burial),
            "MARR" => Some(EventType::Marriage),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            EventType::Birth => "BIRT",
            EventType::Death => "DEAT",
            EventType::Burial => "BURI",
            EventType::Marriage => "MARR",
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.tag().to_string()
    }
}

impl Model {
    pub fn get_event_type(&self) -> Option<EventType> {
        EventType::from_tag(&self.event_type)
    }
}
