//! Schedule record: one add-on service being arranged for delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ActorId, AddonId, ScheduleId, SubscriptionId, VendorId};
use super::state::{Priority, ScheduleStatus};

/// The engine's primary entity.
///
/// Design:
/// - Identity and references never change after creation.
/// - State transitions happen only through the `mark_*` methods, which stamp
///   the matching timestamp exactly once and bump `version`.
/// - Notes live in the audit ledger, not here (see `ScheduleDetail`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub addon: AddonId,
    pub vendor: VendorId,
    pub subscription: SubscriptionId,

    pub status: ScheduleStatus,
    pub scheduled_date: DateTime<Utc>,
    pub priority: Priority,

    /// Content of the originating notification; never rewritten.
    pub email_subject: String,
    pub email_message: String,

    pub vendor_response: Option<String>,
    pub cancellation_reason: Option<String>,

    pub in_progress_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub scheduled_by: ActorId,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency token; bumped on every committed mutation.
    pub version: u64,
}

/// Validated input for a new schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub addon: AddonId,
    pub vendor: VendorId,
    pub subscription: SubscriptionId,
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    pub email_subject: String,
    pub email_message: String,
}

impl Schedule {
    pub fn new(
        id: ScheduleId,
        scheduled_date: DateTime<Utc>,
        input: NewSchedule,
        scheduled_by: ActorId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            addon: input.addon,
            vendor: input.vendor,
            subscription: input.subscription,
            status: ScheduleStatus::Scheduled,
            scheduled_date,
            priority: input.priority,
            email_subject: input.email_subject,
            email_message: input.email_message,
            vendor_response: None,
            cancellation_reason: None,
            in_progress_at: None,
            completed_at: None,
            cancelled_at: None,
            scheduled_by,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Has the scheduled date been reached at `now`?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.scheduled_date
    }

    pub fn mark_in_progress(&mut self, now: DateTime<Utc>) {
        self.status = ScheduleStatus::InProgress;
        self.in_progress_at.get_or_insert(now);
        self.touch(now);
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = ScheduleStatus::Completed;
        self.completed_at.get_or_insert(now);
        self.touch(now);
    }

    pub fn mark_cancelled(&mut self, reason: String, now: DateTime<Utc>) {
        self.status = ScheduleStatus::Cancelled;
        self.cancellation_reason = Some(reason);
        self.cancelled_at.get_or_insert(now);
        self.touch(now);
    }

    /// Move the scheduled date. Status is unchanged.
    pub fn reschedule(&mut self, date: DateTime<Utc>, now: DateTime<Utc>) {
        self.scheduled_date = date;
        self.touch(now);
    }

    pub fn set_vendor_response(&mut self, response: String) {
        self.vendor_response = Some(response);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }

    /// Checks the timestamp and cancellation-reason invariants for the
    /// current status. Returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let expect = |field: &str, set: bool, want: bool| {
            if set == want {
                Ok(())
            } else if want {
                Err(format!("{field} must be set while {}", self.status))
            } else {
                Err(format!("{field} must be empty while {}", self.status))
            }
        };

        let reason_present = self
            .cancellation_reason
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());

        match self.status {
            ScheduleStatus::Scheduled => {
                expect("in_progress_at", self.in_progress_at.is_some(), false)?;
                expect("completed_at", self.completed_at.is_some(), false)?;
                expect("cancelled_at", self.cancelled_at.is_some(), false)?;
            }
            ScheduleStatus::InProgress => {
                expect("in_progress_at", self.in_progress_at.is_some(), true)?;
                expect("completed_at", self.completed_at.is_some(), false)?;
                expect("cancelled_at", self.cancelled_at.is_some(), false)?;
            }
            ScheduleStatus::Completed => {
                expect("completed_at", self.completed_at.is_some(), true)?;
                expect("cancelled_at", self.cancelled_at.is_some(), false)?;
            }
            ScheduleStatus::Cancelled => {
                expect("cancelled_at", self.cancelled_at.is_some(), true)?;
                expect("completed_at", self.completed_at.is_some(), false)?;
            }
        }
        expect(
            "cancellation_reason",
            reason_present,
            self.status == ScheduleStatus::Cancelled,
        )
    }
}

/// What kind of audit entry a note is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoteKind {
    /// Free-text note added by an actor.
    Comment,

    /// Appended by the engine when a status transition commits.
    Transition {
        from: ScheduleStatus,
        to: ScheduleStatus,
    },

    /// Appended by the engine when the scheduled date moves.
    Rescheduled {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub schedule_id: ScheduleId,
    pub author: ActorId,
    pub message: String,
    pub kind: NoteKind,
    pub created_at: DateTime<Utc>,
    /// エンジンが書いた監査エントリのみ、書き込み後の `Schedule.version` を持つ。
    /// 台帳の並びは追記順なので、コミット順はこの値で判断する。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_version: Option<u64>,
}

impl Note {
    pub fn comment(
        schedule_id: ScheduleId,
        author: ActorId,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schedule_id,
            author,
            message: message.into(),
            kind: NoteKind::Comment,
            created_at,
            schedule_version: None,
        }
    }
}

/// A schedule joined with its audit trail, for read APIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDetail {
    pub schedule: Schedule,
    pub notes: Vec<Note>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ulid::Ulid;

    fn new_schedule() -> (Schedule, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let input = NewSchedule {
            addon: AddonId::from_ulid(Ulid::new()),
            vendor: VendorId::from_ulid(Ulid::new()),
            subscription: SubscriptionId::from_ulid(Ulid::new()),
            scheduled_date: Some(now + Duration::days(1)),
            priority: Priority::High,
            email_subject: "Photography booked".into(),
            email_message: "See you tomorrow".into(),
        };
        let schedule = Schedule::new(
            ScheduleId::from_ulid(Ulid::new()),
            now + Duration::days(1),
            input,
            ActorId::from_ulid(Ulid::new()),
            now,
        );
        (schedule, now)
    }

    #[test]
    fn new_schedule_starts_scheduled_without_timestamps() {
        let (schedule, now) = new_schedule();

        assert_eq!(schedule.status, ScheduleStatus::Scheduled);
        assert_eq!(schedule.version, 1);
        assert_eq!(schedule.created_at, now);
        assert!(schedule.in_progress_at.is_none());
        assert!(schedule.completed_at.is_none());
        assert!(schedule.cancelled_at.is_none());
        assert!(schedule.check_invariants().is_ok());
    }

    #[test]
    fn timestamps_are_stamped_once() {
        let (mut schedule, now) = new_schedule();
        let started = now + Duration::days(1);
        let finished = started + Duration::hours(3);

        schedule.mark_in_progress(started);
        schedule.mark_completed(finished);

        assert_eq!(schedule.in_progress_at, Some(started));
        assert_eq!(schedule.completed_at, Some(finished));
        assert_eq!(schedule.updated_at, finished);
        assert_eq!(schedule.version, 3);
        assert!(schedule.check_invariants().is_ok());
    }

    #[test]
    fn cancellation_sets_reason_and_timestamp() {
        let (mut schedule, now) = new_schedule();

        schedule.mark_cancelled("vendor unavailable".into(), now);

        assert_eq!(schedule.cancellation_reason.as_deref(), Some("vendor unavailable"));
        assert_eq!(schedule.cancelled_at, Some(now));
        assert!(schedule.check_invariants().is_ok());
    }

    #[test]
    fn invariant_check_catches_stray_reason() {
        let (mut schedule, _) = new_schedule();
        schedule.cancellation_reason = Some("oops".into());

        let err = schedule.check_invariants().unwrap_err();
        assert!(err.contains("cancellation_reason"));
    }

    #[test]
    fn note_kind_is_tagged() {
        let kind = NoteKind::Transition {
            from: ScheduleStatus::Scheduled,
            to: ScheduleStatus::Cancelled,
        };
        let v = serde_json::to_value(&kind).unwrap();
        assert_eq!(v["type"], "transition");
        assert_eq!(v["to"], "cancelled");
    }

    #[test]
    fn comment_omits_schedule_version() {
        let (schedule, now) = new_schedule();
        let note = Note::comment(schedule.id, schedule.scheduled_by, "hello", now);

        let v = serde_json::to_value(&note).unwrap();
        assert!(v.get("schedule_version").is_none());
        let back: Note = serde_json::from_value(v).unwrap();
        assert_eq!(back.schedule_version, None);
    }
}
