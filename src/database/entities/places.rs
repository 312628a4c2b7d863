use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Geocoding cache keyed by the free-text place name used on events.
/// Derived data: it can always be rebuilt from `events.place`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "places")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocode_status: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeocodeStatus {
    Pending,
    Success,
    Failed,
}

impl GeocodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeStatus::Pending => "pending",
            GeocodeStatus::Success => "success",
            GeocodeStatus::Failed => "failed",
        }
    }

    /// Legacy numeric encoding: 0 = not attempted, 1 = success, -1 = failed.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => GeocodeStatus::Success,
            -1 => GeocodeStatus::Failed,
            _ => GeocodeStatus::Pending,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            GeocodeStatus::Pending => 0,
            GeocodeStatus::Success => 1,
            GeocodeStatus::Failed => -1,
        }
    }
}

impl From<GeocodeStatus> for String {
    fn from(status: GeocodeStatus) -> Self {
        status.as_str().to_string()
    }
}

impl From<String> for GeocodeStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "success" => GeocodeStatus::Success,
            "failed" => GeocodeStatus::Failed,
            _ => GeocodeStatus::Pending,
        }
    }
}

impl Model {
    pub fn get_status(&self) -> GeocodeStatus {
        GeocodeStatus::from(self.geocode_status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocode_status_codes() {
        for status in [
            GeocodeStatus::Pending,
            GeocodeStatus::Success,
            GeocodeStatus::Failed,
        ] {
            assert_eq!(GeocodeStatus::from_code(status.code()), status);
            assert_eq!(GeocodeStatus::from(String::from(status)), status);
        }
        assert_eq!(GeocodeStatus::from_code(7), GeocodeStatus::Pending);
    }
}
