//! LifecycleEngine - schedule の状態機械
//!
//! # フロー（状態を変える操作）
//! 1. IdentityService で権限を解決し、AuthorizationGate で判定（不可なら何も書かない）
//! 2. ScheduleStore から読み、`transition` で次のレコードを計画
//! 3. version による CAS で書き込み。競合したら読み直して計画し直す
//! 4. コミット後に AuditLedger へ追記し、DeliveryPipeline で通知
//!
//! 通知の失敗はコミット済みの状態を取り消さない（`Committed::delivery` で報告）。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::delivery::{DeliveryPipeline, DeliveryStatus};
use super::transition::{self, StatusUpdate};
use crate::config::SchedulingConfig;
use crate::domain::{
    Action, ActorId, AddonId, AddonService, EventKind, LifecycleError, NewSchedule, Note, NoteKind, Schedule,
    ScheduleDetail, ScheduleId, ScheduleStatus, StoreError, VendorId,
};
use crate::gate::{SubscriptionGate, authorize};
use crate::ports::{
    AuditLedger, CatalogService, Clock, IdGenerator, IdentityService, InsertPolicy, LedgerView,
    NotificationContext, ScheduleStore,
};

/// A committed state change plus the outcome of its notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Committed {
    pub schedule: Schedule,
    pub delivery: DeliveryStatus,
}

impl Committed {
    /// False means partial success: state committed, notification pending or
    /// dead-lettered.
    pub fn is_fully_delivered(&self) -> bool {
        self.delivery.is_delivered()
    }
}

pub struct LifecycleEngine {
    pub(crate) store: Arc<dyn ScheduleStore>,
    pub(crate) ledger: Arc<dyn AuditLedger>,
    pub(crate) catalog: Arc<dyn CatalogService>,
    pub(crate) identity: Arc<dyn IdentityService>,
    pub(crate) subscriptions: SubscriptionGate,
    pub(crate) delivery: Arc<DeliveryPipeline>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) config: SchedulingConfig,
}

impl LifecycleEngine {
    /// The delivery pipeline, for running the retry loop and inspecting
    /// dead letters.
    pub fn delivery(&self) -> Arc<DeliveryPipeline> {
        Arc::clone(&self.delivery)
    }

    // ========================================
    // 状態を変える操作
    // ========================================

    #[instrument(skip(self, input), fields(actor = %actor, vendor = %input.vendor, addon = %input.addon))]
    pub async fn create_schedule(
        &self,
        input: NewSchedule,
        actor: ActorId,
    ) -> Result<Committed, LifecycleError> {
        self.require(actor, Action::Create).await?;

        let scheduled_date = input
            .scheduled_date
            .ok_or_else(|| LifecycleError::validation("scheduled date is required"))?;
        if input.email_subject.trim().is_empty() {
            return Err(LifecycleError::validation("email subject must not be empty"));
        }
        if input.email_message.trim().is_empty() {
            return Err(LifecycleError::validation("email message must not be empty"));
        }

        let subscription = self
            .subscriptions
            .resolve_active(input.subscription, input.addon)
            .await?
            .ok_or(LifecycleError::SubscriptionInactive {
                subscription: input.subscription,
                addon: input.addon,
            })?;
        if subscription.vendor != input.vendor {
            return Err(LifecycleError::validation(format!(
                "subscription {} does not belong to vendor {}",
                subscription.id, input.vendor
            )));
        }

        let now = self.clock.now();
        let schedule = Schedule::new(
            self.ids.generate_schedule_id(),
            scheduled_date,
            input,
            actor,
            now,
        );
        let policy = if self.config.enforce_single_active {
            InsertPolicy::RejectIfActive
        } else {
            InsertPolicy::AllowConcurrent
        };
        self.store.insert(schedule.clone(), policy).await?;
        info!(schedule_id = %schedule.id, %scheduled_date, "schedule created");

        let delivery = self
            .notify(&schedule, EventKind::Created, actor, None)
            .await;
        Ok(Committed { schedule, delivery })
    }

    #[instrument(skip(self, update), fields(actor = %actor, target = ?update.target))]
    pub async fn update_status(
        &self,
        id: ScheduleId,
        update: StatusUpdate,
        actor: ActorId,
    ) -> Result<Committed, LifecycleError> {
        self.require(actor, Action::Transition).await?;

        let (previous, schedule) = self
            .commit(id, |current, now| transition::plan_status_update(current, &update, now))
            .await?;
        info!(
            schedule_id = %id,
            from = %previous.status,
            to = %schedule.status,
            "status transition committed"
        );

        let message = schedule
            .cancellation_reason
            .clone()
            .filter(|_| schedule.status == ScheduleStatus::Cancelled)
            .or_else(|| update.vendor_response.clone().filter(|r| !r.trim().is_empty()))
            .unwrap_or_else(|| format!("status changed from {} to {}", previous.status, schedule.status));

        // InProgress への遷移に日付が同梱された場合は日付変更も記録・通知する
        let moved = schedule.scheduled_date != previous.scheduled_date;
        if moved {
            self.audit(Note {
                schedule_id: id,
                author: actor,
                message: format!(
                    "rescheduled from {} to {}",
                    previous.scheduled_date, schedule.scheduled_date
                ),
                kind: NoteKind::Rescheduled {
                    from: previous.scheduled_date,
                    to: schedule.scheduled_date,
                },
                created_at: schedule.updated_at,
                schedule_version: Some(schedule.version),
            })
            .await;
        }
        self.audit(Note {
            schedule_id: id,
            author: actor,
            message,
            kind: NoteKind::Transition {
                from: previous.status,
                to: schedule.status,
            },
            created_at: schedule.updated_at,
            schedule_version: Some(schedule.version),
        })
        .await;

        let rescheduled = if moved {
            Some(
                self.notify(
                    &schedule,
                    EventKind::Rescheduled,
                    actor,
                    Some(previous.scheduled_date),
                )
                .await,
            )
        } else {
            None
        };
        let status = self
            .notify(&schedule, EventKind::for_status(schedule.status), actor, None)
            .await;
        let delivery = match rescheduled {
            Some(first) if !first.is_delivered() => first,
            _ => status,
        };
        Ok(Committed { schedule, delivery })
    }

    /// Move the scheduled date of a schedule that is still scheduled or in
    /// progress. Dispatches a `rescheduled` notification.
    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn reschedule(
        &self,
        id: ScheduleId,
        date: DateTime<Utc>,
        actor: ActorId,
    ) -> Result<Committed, LifecycleError> {
        self.require(actor, Action::Transition).await?;

        let (previous, schedule) = self
            .commit(id, |current, now| transition::plan_reschedule(current, date, now))
            .await?;
        info!(
            schedule_id = %id,
            from = %previous.scheduled_date,
            to = %schedule.scheduled_date,
            "schedule rescheduled"
        );

        self.audit(Note {
            schedule_id: id,
            author: actor,
            message: format!(
                "rescheduled from {} to {}",
                previous.scheduled_date, schedule.scheduled_date
            ),
            kind: NoteKind::Rescheduled {
                from: previous.scheduled_date,
                to: schedule.scheduled_date,
            },
            created_at: schedule.updated_at,
            schedule_version: Some(schedule.version),
        })
        .await;

        let delivery = self
            .notify(
                &schedule,
                EventKind::Rescheduled,
                actor,
                Some(previous.scheduled_date),
            )
            .await;
        Ok(Committed { schedule, delivery })
    }

    /// Append a free-text note. Notes are never deduplicated; the schedule
    /// record itself is not touched.
    #[instrument(skip(self, message), fields(actor = %actor))]
    pub async fn add_note(
        &self,
        id: ScheduleId,
        message: impl Into<String> + Send,
        actor: ActorId,
    ) -> Result<Note, LifecycleError> {
        self.require(actor, Action::AddNote).await?;
        if self.store.get(id).await?.is_none() {
            return Err(LifecycleError::NotFound(id));
        }

        let note = Note::comment(id, actor, message, self.clock.now());
        self.ledger.append(id, note.clone()).await?;
        debug!(schedule_id = %id, "note appended");
        Ok(note)
    }

    // ========================================
    // 読み取り（ポーリング用の表面）
    // ========================================

    pub async fn schedule(&self, id: ScheduleId) -> Result<ScheduleDetail, LifecycleError> {
        let schedule = self
            .store
            .get(id)
            .await?
            .ok_or(LifecycleError::NotFound(id))?;
        let notes = self.ledger.list(id).await?.to_vec();
        Ok(ScheduleDetail { schedule, notes })
    }

    pub async fn notes(&self, id: ScheduleId) -> Result<LedgerView, LifecycleError> {
        if self.store.get(id).await?.is_none() {
            return Err(LifecycleError::NotFound(id));
        }
        Ok(self.ledger.list(id).await?)
    }

    pub async fn schedules_for_vendor(&self, vendor: VendorId) -> Result<Vec<Schedule>, LifecycleError> {
        Ok(self.store.list_by_vendor(vendor).await?)
    }

    /// The oldest schedule for `(vendor, addon)` that is still scheduled or
    /// in progress, if any.
    pub async fn active_schedule(
        &self,
        vendor: VendorId,
        addon: AddonId,
    ) -> Result<Option<Schedule>, LifecycleError> {
        let found = self
            .store
            .find(
                vendor,
                addon,
                &[ScheduleStatus::Scheduled, ScheduleStatus::InProgress],
            )
            .await?;
        Ok(found.into_iter().next())
    }

    // ========================================
    // 内部処理
    // ========================================

    async fn require(&self, actor: ActorId, action: Action) -> Result<(), LifecycleError> {
        let allowed = self
            .identity
            .capabilities(actor)
            .await?
            .is_some_and(|caps| authorize(&caps, action));
        if allowed {
            Ok(())
        } else {
            debug!(%actor, %action, "authorization denied");
            Err(LifecycleError::Forbidden { actor, action })
        }
    }

    /// Atomic read-plan-write on one schedule. Returns (before, after).
    ///
    /// A lost version race re-reads and re-plans, so the loser of two
    /// concurrent transitions sees the winner's state.
    async fn commit<F>(&self, id: ScheduleId, plan: F) -> Result<(Schedule, Schedule), LifecycleError>
    where
        F: Fn(&Schedule, DateTime<Utc>) -> Result<Schedule, LifecycleError>,
    {
        let mut last_conflict = None;
        for attempt in 1..=self.config.max_write_retries {
            let current = self
                .store
                .get(id)
                .await?
                .ok_or(LifecycleError::NotFound(id))?;
            let next = plan(&current, self.clock.now()).inspect_err(|err| {
                debug!(schedule_id = %id, status = %current.status, error = %err, "update rejected");
            })?;
            match self.store.replace(next.clone(), current.version).await {
                Ok(()) => return Ok((current, next)),
                Err(conflict @ StoreError::VersionConflict { .. }) => {
                    debug!(schedule_id = %id, attempt, "version conflict, re-planning");
                    last_conflict = Some(conflict);
                }
                Err(other) => return Err(other.into()),
            }
        }
        let err = last_conflict.unwrap_or(StoreError::Unavailable(format!(
            "gave up writing schedule {id}"
        )));
        warn!(schedule_id = %id, error = %err, "write retries exhausted");
        Err(LifecycleError::Storage(err))
    }

    /// Runs after commit. A failed append is logged, never returned.
    async fn audit(&self, note: Note) {
        let schedule_id = note.schedule_id;
        if let Err(err) = self.ledger.append(schedule_id, note).await {
            error!(%schedule_id, error = %err, "failed to append audit entry for committed transition");
        }
    }

    async fn notify(
        &self,
        schedule: &Schedule,
        kind: EventKind,
        actor: ActorId,
        previous_date: Option<DateTime<Utc>>,
    ) -> DeliveryStatus {
        let context = NotificationContext {
            actor,
            addon: self.lookup_addon(schedule.addon).await,
            recipient: self.lookup_contact(schedule.vendor).await,
            previous_date,
        };
        self.delivery.deliver(schedule.clone(), kind, context).await
    }

    async fn lookup_addon(&self, addon: AddonId) -> Option<AddonService> {
        match self.catalog.addon(addon).await {
            Ok(found) => found,
            Err(err) => {
                warn!(%addon, error = %err, "catalog lookup failed, notifying without add-on details");
                None
            }
        }
    }

    async fn lookup_contact(&self, vendor: VendorId) -> Option<String> {
        match self.identity.vendor_contact(vendor).await {
            Ok(found) => found,
            Err(err) => {
                warn!(%vendor, error = %err, "vendor contact lookup failed");
                None
            }
        }
    }
}
