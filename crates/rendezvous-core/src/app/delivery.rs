//! DeliveryPipeline - 通知配送の再送とデッドレター
//!
//! # フロー
//! 1. コミット直後に `deliver()` で 1 回目を同期的に送る
//! 2. 失敗したらバックオフ付きで再送キューに積み、呼び出し元には部分成功を返す
//! 3. `drain_due()`（または `run()` ループ）が期限の来たジョブを再送する
//! 4. `max_attempts` を使い切ったジョブはデッドレターへ。運用者が `redeliver()` できる
//!
//! at-least-once。重複配送は許容、黙って失うことはしない。

use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::retry::RetryPolicy;
use crate::domain::{DeliveryError, EventKind, Schedule};
use crate::ports::{Ack, Clock, NotificationContext, NotificationDispatcher};

pub type DeliveryJobId = u64;

/// One notification owed for a committed transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryJob {
    pub id: DeliveryJobId,
    /// Snapshot of the schedule as committed.
    pub schedule: Schedule,
    pub kind: EventKind,
    pub context: NotificationContext,
    pub attempts: u32,
    pub last_error: Option<DeliveryError>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

/// Result of a delivery attempt as seen by the caller of a lifecycle
/// operation. Anything but `Delivered` is a partial success: the state change
/// is committed, the notification is not (yet).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered {
        ack: Ack,
    },
    Retrying {
        job_id: DeliveryJobId,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        error: String,
    },
    DeadLettered {
        job_id: DeliveryJobId,
        attempts: u32,
        error: String,
    },
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered { .. })
    }
}

/// What one `drain_due()` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub rescheduled: usize,
    pub dead_lettered: usize,
}

/// Min-heap entry: earliest `next_attempt_at` first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledRetry {
    next_attempt_at: DateTime<Utc>,
    job_id: DeliveryJobId,
}

impl PartialOrd for ScheduledRetry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledRetry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering: earlier times have higher priority
        other
            .next_attempt_at
            .cmp(&self.next_attempt_at)
            .then_with(|| other.job_id.cmp(&self.job_id))
    }
}

#[derive(Default)]
struct PipelineState {
    pending: HashMap<DeliveryJobId, DeliveryJob>,
    scheduled: BinaryHeap<ScheduledRetry>,
    dead: Vec<DeliveryJob>,
    next_job_id: DeliveryJobId,
}

impl PipelineState {
    fn allocate_job_id(&mut self) -> DeliveryJobId {
        self.next_job_id += 1;
        self.next_job_id
    }

    /// Take every job whose retry time has come.
    fn take_due(&mut self, now: DateTime<Utc>) -> Vec<DeliveryJob> {
        let mut due = Vec::new();
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_attempt_at > now {
                break; // Heap is sorted, so we can stop
            }
            if let Some(entry) = self.scheduled.pop()
                && let Some(job) = self.pending.remove(&entry.job_id)
            {
                due.push(job);
            }
        }
        due
    }
}

pub struct DeliveryPipeline {
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    state: Mutex<PipelineState>,
}

impl DeliveryPipeline {
    pub fn new(
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            dispatcher,
            clock,
            policy,
            state: Mutex::new(PipelineState::default()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// First, synchronous delivery attempt for a committed transition.
    pub async fn deliver(
        &self,
        schedule: Schedule,
        kind: EventKind,
        context: NotificationContext,
    ) -> DeliveryStatus {
        let id = self.state.lock().await.allocate_job_id();
        let job = DeliveryJob {
            id,
            schedule,
            kind,
            context,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
        };
        self.attempt(job).await
    }

    async fn attempt(&self, mut job: DeliveryJob) -> DeliveryStatus {
        job.attempts += 1;
        let result = self
            .dispatcher
            .dispatch(&job.schedule, job.kind, &job.context)
            .await;
        match result {
            Ok(ack) => {
                debug!(
                    schedule_id = %job.schedule.id,
                    kind = %job.kind,
                    attempts = job.attempts,
                    message_id = %ack.message_id,
                    "notification delivered"
                );
                DeliveryStatus::Delivered { ack }
            }
            Err(err) => self.record_failure(job, err).await,
        }
    }

    async fn record_failure(&self, mut job: DeliveryJob, err: DeliveryError) -> DeliveryStatus {
        let error = err.to_string();
        job.last_error = Some(err);
        let mut state = self.state.lock().await;

        if self.policy.allows_retry(job.attempts) {
            let delay = self.policy.next_delay(job.attempts);
            let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
            let next_attempt_at = self
                .clock
                .now()
                .checked_add_signed(delay)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            warn!(
                schedule_id = %job.schedule.id,
                kind = %job.kind,
                attempts = job.attempts,
                %next_attempt_at,
                %error,
                "notification delivery failed, retry scheduled"
            );
            job.next_attempt_at = Some(next_attempt_at);
            let status = DeliveryStatus::Retrying {
                job_id: job.id,
                attempts: job.attempts,
                next_attempt_at,
                error,
            };
            state.scheduled.push(ScheduledRetry {
                next_attempt_at,
                job_id: job.id,
            });
            state.pending.insert(job.id, job);
            status
        } else {
            error!(
                schedule_id = %job.schedule.id,
                kind = %job.kind,
                attempts = job.attempts,
                %error,
                "notification delivery exhausted retries, moved to dead letters"
            );
            job.next_attempt_at = None;
            let status = DeliveryStatus::DeadLettered {
                job_id: job.id,
                attempts: job.attempts,
                error,
            };
            state.dead.push(job);
            status
        }
    }

    /// Retry every job whose backoff has elapsed.
    pub async fn drain_due(&self) -> DrainReport {
        let due = {
            let mut state = self.state.lock().await;
            state.take_due(self.clock.now())
        }; // Lock released here, dispatch happens outside it

        let mut report = DrainReport::default();
        for job in due {
            match self.attempt(job).await {
                DeliveryStatus::Delivered { .. } => report.delivered += 1,
                DeliveryStatus::Retrying { .. } => report.rescheduled += 1,
                DeliveryStatus::DeadLettered { .. } => report.dead_lettered += 1,
            }
        }
        if report != DrainReport::default() {
            info!(
                delivered = report.delivered,
                rescheduled = report.rescheduled,
                dead_lettered = report.dead_lettered,
                "delivery retry pass finished"
            );
        }
        report
    }

    /// Poll for due retries until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F, poll_interval: std::time::Duration)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("delivery retry loop shutting down");
                    break;
                }
                _ = tokio::time::sleep(poll_interval) => {
                    self.drain_due().await;
                }
            }
        }
    }

    /// Put a dead-lettered job back through delivery with a fresh budget.
    /// Returns `None` if no dead letter has that id.
    pub async fn redeliver(&self, job_id: DeliveryJobId) -> Option<DeliveryStatus> {
        let job = {
            let mut state = self.state.lock().await;
            let index = state.dead.iter().position(|job| job.id == job_id)?;
            state.dead.remove(index)
        };
        info!(job_id, schedule_id = %job.schedule.id, "redelivering dead letter");
        let job = DeliveryJob {
            attempts: 0,
            next_attempt_at: None,
            ..job
        };
        Some(self.attempt(job).await)
    }

    /// Jobs waiting for a retry, earliest first.
    pub async fn pending(&self) -> Vec<DeliveryJob> {
        let state = self.state.lock().await;
        let mut jobs: Vec<DeliveryJob> = state.pending.values().cloned().collect();
        jobs.sort_by_key(|job| (job.next_attempt_at, job.id));
        jobs
    }

    /// Operator-visible list of notifications that could not be delivered.
    pub async fn dead_letters(&self) -> Vec<DeliveryJob> {
        self.state.lock().await.dead.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorId, AddonId, NewSchedule, Priority, ScheduleId, SubscriptionId, VendorId};
    use crate::impls::{EmailDispatcher, RecordingChannel};
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone};
    use ulid::Ulid;

    struct Fixture {
        pipeline: DeliveryPipeline,
        channel: Arc<RecordingChannel>,
        clock: FixedClock,
    }

    fn fixture(max_attempts: u32) -> Fixture {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Arc::new(EmailDispatcher::new("no-reply@test", channel.clone()));
        let policy = RetryPolicy {
            base_delay: std::time::Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts,
        };
        Fixture {
            pipeline: DeliveryPipeline::new(dispatcher, Arc::new(clock.clone()), policy),
            channel,
            clock,
        }
    }

    fn job_parts() -> (Schedule, NotificationContext) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let actor = ActorId::from_ulid(Ulid::new());
        let schedule = Schedule::new(
            ScheduleId::from_ulid(Ulid::new()),
            now,
            NewSchedule {
                addon: AddonId::from_ulid(Ulid::new()),
                vendor: VendorId::from_ulid(Ulid::new()),
                subscription: SubscriptionId::from_ulid(Ulid::new()),
                scheduled_date: Some(now),
                priority: Priority::Urgent,
                email_subject: "Booked".into(),
                email_message: "Hello".into(),
            },
            actor,
            now,
        );
        let context = NotificationContext {
            actor,
            addon: None,
            recipient: Some("vendor@example.com".into()),
            previous_date: None,
        };
        (schedule, context)
    }

    #[tokio::test]
    async fn successful_first_attempt_is_delivered() {
        let f = fixture(3);
        let (schedule, context) = job_parts();

        let status = f.pipeline.deliver(schedule, EventKind::Created, context).await;

        assert!(status.is_delivered());
        assert_eq!(f.channel.sent().len(), 1);
        assert!(f.pipeline.pending().await.is_empty());
    }

    #[tokio::test]
    async fn failure_is_retried_after_backoff() {
        let f = fixture(3);
        f.channel.fail_next(1);
        let (schedule, context) = job_parts();

        let status = f.pipeline.deliver(schedule, EventKind::Created, context).await;
        let DeliveryStatus::Retrying { attempts, next_attempt_at, .. } = status else {
            panic!("expected Retrying, got {status:?}");
        };
        assert_eq!(attempts, 1);
        assert_eq!(next_attempt_at, f.clock.now() + Duration::seconds(10));

        // まだ期限前
        assert_eq!(f.pipeline.drain_due().await, DrainReport::default());

        f.clock.advance(Duration::seconds(10));
        let report = f.pipeline.drain_due().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(f.channel.sent().len(), 1);
        assert!(f.pipeline.pending().await.is_empty());
    }

    #[tokio::test]
    async fn exhausted_jobs_become_dead_letters_and_can_be_redelivered() {
        let f = fixture(2);
        f.channel.fail_next(2);
        let (schedule, context) = job_parts();

        let first = f.pipeline.deliver(schedule, EventKind::Cancelled, context).await;
        assert!(matches!(first, DeliveryStatus::Retrying { .. }));

        f.clock.advance(Duration::seconds(10));
        let report = f.pipeline.drain_due().await;
        assert_eq!(report.dead_lettered, 1);

        let dead = f.pipeline.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
        assert_eq!(dead[0].kind, EventKind::Cancelled);
        assert_eq!(
            dead[0].last_error,
            Some(DeliveryError::Unavailable("intentional failure".into()))
        );

        let status = f.pipeline.redeliver(dead[0].id).await.unwrap();
        assert!(status.is_delivered());
        assert!(f.pipeline.dead_letters().await.is_empty());
        assert!(f.pipeline.redeliver(dead[0].id).await.is_none());
    }

    #[tokio::test]
    async fn single_attempt_policy_dead_letters_immediately() {
        let f = fixture(1);
        f.channel.fail_next(1);
        let (schedule, context) = job_parts();

        let status = f.pipeline.deliver(schedule, EventKind::Completed, context).await;
        assert!(matches!(status, DeliveryStatus::DeadLettered { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown() {
        let f = fixture(3);
        f.channel.fail_next(1);
        let (schedule, context) = job_parts();
        f.pipeline.deliver(schedule, EventKind::Created, context).await;
        f.clock.advance(Duration::seconds(10));

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async {
            let _ = rx.await;
        };
        let run = f.pipeline.run(shutdown, std::time::Duration::from_millis(5));
        let stop = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let _ = tx.send(());
        };
        tokio::join!(run, stop);

        assert_eq!(f.channel.sent().len(), 1);
    }
}
