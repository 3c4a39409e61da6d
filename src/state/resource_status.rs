/// Resource status definitions for reporting a harvest run
use crate::model::PersistMode;
use std::fmt;

/// Final state of one resource kind in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Every page was read
    Complete { records: usize },

    /// Some data was gathered but not all of it: the API refused the key,
    /// pagination stalled, or some of the per-community or per-post requests
    /// failed
    Degraded { records: usize, reason: String },

    /// The resource could not be fetched at all
    Failed { error: String },

    /// The run was cancelled before or during this resource
    Cancelled { records: usize },

    /// Not requested in this run
    Skipped,
}

impl ResourceStatus {
    /// Records gathered under this status
    pub fn records(&self) -> usize {
        match self {
            Self::Complete { records }
            | Self::Degraded { records, .. }
            | Self::Cancelled { records } => *records,
            Self::Failed { .. } | Self::Skipped => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Whether the gathered rows should be written for a kind stored with `mode`
    ///
    /// Snapshots are only replaced by a complete fetch; merged kinds accept any
    /// non-empty partial result since merging never removes stored rows.
    pub fn should_persist(&self, mode: PersistMode) -> bool {
        match (self, mode) {
            (Self::Complete { .. }, _) => true,
            (Self::Degraded { records, .. }, PersistMode::Merge)
            | (Self::Cancelled { records }, PersistMode::Merge) => *records > 0,
            _ => false,
        }
    }

    /// Detail text for reports, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Degraded { reason, .. } => Some(reason),
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Complete { .. } => "complete",
            Self::Degraded { .. } => "degraded",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{} ({})", self.to_db_string(), detail),
            None => write!(f, "{}", self.to_db_string()),
        }
    }
}
