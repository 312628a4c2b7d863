pub mod events;
pub mod families;
pub mod individuals;
pub mod media;
pub mod notes;
pub mod places;
pub mod sources;

// Relationship tables, one row per edge
pub mod child_in_family;
pub mod family_events;
pub mod family_notes;
pub mod family_sources;
pub mod individual_events;
pub mod individual_notes;
pub mod individual_sources;
pub mod media_events;
pub mod media_individuals;
