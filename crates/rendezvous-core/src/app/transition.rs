//! Transition table and guards.
//!
//! Pure functions: current record + request + `now` → next record or an
//! error. Nothing here touches storage, so the engine can re-run a plan after
//! losing a concurrent write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GuardFailure, LifecycleError, Schedule, ScheduleStatus};

/// Request to move a schedule to `target`, with optional field updates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub target: Option<ScheduleStatus>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vendor_response: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl StatusUpdate {
    pub fn to(target: ScheduleStatus) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    pub fn with_scheduled_date(mut self, date: DateTime<Utc>) -> Self {
        self.scheduled_date = Some(date);
        self
    }

    pub fn with_vendor_response(mut self, response: impl Into<String>) -> Self {
        self.vendor_response = Some(response.into());
        self
    }

    pub fn with_cancellation_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancellation_reason = Some(reason.into());
        self
    }
}

/// Does the state graph have an edge `from -> to`?
pub fn edge_exists(from: ScheduleStatus, to: ScheduleStatus) -> bool {
    use ScheduleStatus::*;
    matches!(
        (from, to),
        (Scheduled, InProgress)
            | (Scheduled, Completed)
            | (InProgress, Completed)
            | (Scheduled, Cancelled)
            | (InProgress, Cancelled)
    )
}

/// Evaluate the guard of an existing edge.
pub fn check_guard(
    schedule: &Schedule,
    target: ScheduleStatus,
    cancellation_reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), GuardFailure> {
    match target {
        ScheduleStatus::InProgress | ScheduleStatus::Completed => {
            if schedule.is_due(now) {
                Ok(())
            } else {
                Err(GuardFailure::DateNotReached {
                    scheduled_date: schedule.scheduled_date,
                    now,
                })
            }
        }
        ScheduleStatus::Cancelled => match cancellation_reason {
            Some(_) => Ok(()),
            None => Err(GuardFailure::MissingCancellationReason),
        },
        // no edge leads back to the initial state
        ScheduleStatus::Scheduled => Ok(()),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Plan a status change. Returns the record to persist.
///
/// Check order: edge existence, request shape, guard.
pub fn plan_status_update(
    current: &Schedule,
    update: &StatusUpdate,
    now: DateTime<Utc>,
) -> Result<Schedule, LifecycleError> {
    let target = update
        .target
        .ok_or_else(|| LifecycleError::validation("target status is required"))?;
    if !edge_exists(current.status, target) {
        return Err(LifecycleError::InvalidTransition {
            from: current.status,
            to: target,
        });
    }

    let reason = non_blank(update.cancellation_reason.as_deref());
    if reason.is_some() && target != ScheduleStatus::Cancelled {
        return Err(LifecycleError::validation(
            "cancellation reason is only accepted when cancelling",
        ));
    }
    if update.scheduled_date.is_some() && target.is_terminal() {
        return Err(LifecycleError::validation(
            "scheduled date cannot change on a move to a terminal status",
        ));
    }

    check_guard(current, target, reason.as_deref(), now)?;

    let mut next = current.clone();
    if let Some(date) = update.scheduled_date {
        next.scheduled_date = date;
    }
    if let Some(response) = non_blank(update.vendor_response.as_deref()) {
        next.set_vendor_response(response);
    }
    match (target, reason) {
        (ScheduleStatus::InProgress, _) => next.mark_in_progress(now),
        (ScheduleStatus::Completed, _) => next.mark_completed(now),
        (ScheduleStatus::Cancelled, Some(reason)) => next.mark_cancelled(reason, now),
        // guarded above
        (ScheduleStatus::Cancelled, None) => {
            return Err(GuardFailure::MissingCancellationReason.into());
        }
        (ScheduleStatus::Scheduled, _) => {
            return Err(LifecycleError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }
    }
    Ok(next)
}

/// Plan a change of the scheduled date. Status is unchanged.
pub fn plan_reschedule(
    current: &Schedule,
    date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Schedule, LifecycleError> {
    if current.status.is_terminal() {
        return Err(LifecycleError::InvalidTransition {
            from: current.status,
            to: current.status,
        });
    }
    if date == current.scheduled_date {
        return Err(LifecycleError::validation(
            "new scheduled date equals the current one",
        ));
    }
    let mut next = current.clone();
    next.reschedule(date, now);
    Ok(next)
}
