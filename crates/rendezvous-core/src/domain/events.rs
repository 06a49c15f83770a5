//! Events - 通知の種類

use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::ScheduleStatus;

/// Which lifecycle event a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Rescheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl EventKind {
    /// The event emitted when a schedule enters `status`.
    pub fn for_status(status: ScheduleStatus) -> Self {
        match status {
            ScheduleStatus::Scheduled => EventKind::Created,
            ScheduleStatus::InProgress => EventKind::InProgress,
            ScheduleStatus::Completed => EventKind::Completed,
            ScheduleStatus::Cancelled => EventKind::Cancelled,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Rescheduled => "rescheduled",
            EventKind::InProgress => "in_progress",
            EventKind::Completed => "completed",
            EventKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
