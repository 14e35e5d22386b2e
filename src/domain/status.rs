//! Status contract returned by a reconcile pass

use crate::error::{AppError, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Never reconciled
    #[default]
    Initialising,
    Reconciled,
    Failing,
}

/// Status persisted by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ready: bool,
    /// kind -> names of secondary resources managed for this resource
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secondary_resources: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// Mutating admin calls issued by one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub linked: u64,
    pub unlinked: u64,
}

impl PassReport {
    pub fn mutations(&self) -> u64 {
        self.created + self.updated + self.deleted + self.linked + self.unlinked
    }

    pub fn is_noop(&self) -> bool {
        self.mutations() == 0
    }
}

impl AddAssign for PassReport {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.linked += other.linked;
        self.unlinked += other.unlinked;
    }
}

/// Result of one reconcile pass
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub report: Result<PassReport>,
    pub secondary_resources: BTreeMap<String, Vec<String>>,
    /// Secondary resources dropped from bookkeeping during this pass
    pub unmanaged: Vec<String>,
}

impl ReconcileOutcome {
    pub fn failed(error: AppError, previous: &ResourceStatus) -> Self {
        Self {
            report: Err(error),
            secondary_resources: previous.secondary_resources.clone(),
            unmanaged: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.report.is_ok()
    }

    pub fn error(&self) -> Option<&AppError> {
        self.report.as_ref().err()
    }

    /// Build the next status. Success clears any previous failure in one step.
    pub fn into_status(self, previous: &ResourceStatus) -> ResourceStatus {
        match self.report {
            Ok(_) => ResourceStatus {
                phase: Phase::Reconciled,
                message: String::new(),
                ready: true,
                secondary_resources: self.secondary_resources,
                error_kind: None,
            },
            Err(e) => ResourceStatus {
                phase: Phase::Failing,
                message: e.to_string(),
                ready: false,
                secondary_resources: previous.secondary_resources.clone(),
                error_kind: Some(e.kind()),
            },
        }
    }
}
