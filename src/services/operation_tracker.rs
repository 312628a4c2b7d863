use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{ImportExportError, ImportExportResult};

/// Operations that rewrite the graph. At most one runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    GedcomImport,
    BackupRestore,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::GedcomImport => f.write_str("GEDCOM import"),
            OperationKind::BackupRestore => f.write_str("backup restore"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningOperation {
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedOperation {
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub running: Option<RunningOperation>,
    pub last_finished: Option<FinishedOperation>,
}

impl OperationStatus {
    pub fn is_busy(&self) -> bool {
        self.running.is_some()
    }
}

/// Process-wide job state. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct OperationTracker {
    state: Arc<Mutex<OperationStatus>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the single operation slot, or fail straight away with
    /// [`ImportExportError::OperationInProgress`]. The slot is released when
    /// the returned permit is finished or dropped.
    pub fn try_begin(&self, kind: OperationKind) -> ImportExportResult<OperationPermit> {
        let mut state = self.lock();
        if let Some(running) = &state.running {
            warn!(
                "Rejecting {}: {} running since {}",
                kind, running.kind, running.started_at
            );
            return Err(ImportExportError::OperationInProgress(format!(
                "{} started at {}",
                running.kind,
                running.started_at.to_rfc3339()
            )));
        }

        let started_at = Utc::now();
        state.running = Some(RunningOperation { kind, started_at });
        info!("Starting {}", kind);

        Ok(OperationPermit {
            tracker: self.clone(),
            kind,
            started_at,
            finished: false,
        })
    }

    pub fn status(&self) -> OperationStatus {
        self.lock().clone()
    }

    fn complete(&self, finished: FinishedOperation) {
        let mut state = self.lock();
        state.running = None;
        state.last_finished = Some(finished);
    }

    fn lock(&self) -> MutexGuard<'_, OperationStatus> {
        // The state is plain data, so a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof of holding the operation slot.
#[derive(Debug)]
pub struct OperationPermit {
    tracker: OperationTracker,
    kind: OperationKind,
    started_at: DateTime<Utc>,
    finished: bool,
}

impl OperationPermit {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn finish(mut self, success: bool, message: impl Into<String>) {
        self.record(success, message.into());
    }

    /// Record the outcome of `result` and hand it back.
    pub fn finish_with<T>(self, result: ImportExportResult<T>) -> ImportExportResult<T> {
        match &result {
            Ok(_) => self.finish(true, "completed"),
            Err(err) => self.finish(false, err.to_string()),
        }
        result
    }

    fn record(&mut self, success: bool, message: String) {
        if self.finished {
            return;
        }
        self.finished = true;
        info!("Finished {} (success: {})", self.kind, success);
        self.tracker.complete(FinishedOperation {
            kind: self.kind,
            started_at: self.started_at,
            finished_at: Utc::now(),
            success,
            message,
        });
    }
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        self.record(false, "abandoned before completion".to_string());
    }
}
