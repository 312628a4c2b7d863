pub mod backup_service;
pub mod gedcom_service;
pub mod graph_store;
pub mod operation_tracker;
pub mod place_service;

pub use backup_service::*;
pub use gedcom_service::*;
pub use graph_store::*;
pub use operation_tracker::*;
pub use place_service::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which importer pass produced a [`SkippedRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPass {
    Sources,
    Notes,
    Individuals,
    Families,
    IndividualEvents,
    FamilyEvents,
}

impl fmt::Display for ImportPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportPass::Sources => "sources",
            ImportPass::Notes => "notes",
            ImportPass::Individuals => "individuals",
            ImportPass::Families => "families",
            ImportPass::IndividualEvents => "individual events",
            ImportPass::FamilyEvents => "family events",
        };
        f.write_str(name)
    }
}

/// A record or reference the importer dropped. Skips never abort a pass;
/// they are reported back in the import summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub pass: ImportPass,
    /// Pointer of the record involved, or its line number when it has none.
    pub record: String,
    pub reason: String,
}

impl SkippedRecord {
    pub fn new(pass: ImportPass, record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pass,
            record: record.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.pass, self.record, self.reason)
    }
}
