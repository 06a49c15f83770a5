//! Errors - エラー型と分類
//!
//! - `LifecycleError`: エンジン操作が呼び出し元へ同期的に返すエラー
//! - `GuardFailure`: 遷移の辺は存在するがガード条件を満たさなかった理由
//! - `DeliveryError`: 通知配送の失敗（状態遷移はロールバックしない）
//! - `StoreError`: 永続化ポートのエラー

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::actor::Action;
use super::ids::{ActorId, AddonId, ScheduleId, SubscriptionId};
use super::state::ScheduleStatus;

/// ErrorKind は運用上の分類
///
/// - Client: 入力や権限の問題。呼び出し元が直して再送する
/// - Precondition: ビジネス上の前提条件を満たしていない。自動リトライしない
/// - Infrastructure: ストレージなどの障害。リトライしてよい
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Client,
    Precondition,
    Infrastructure,
}

/// The specific unmet condition when a transition edge exists but its guard
/// is false.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardFailure {
    #[error("scheduled date {scheduled_date} has not been reached (now {now})")]
    DateNotReached {
        scheduled_date: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("a non-empty cancellation reason is required")]
    MissingCancellationReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("schedule {0} already exists")]
    Duplicate(ScheduleId),

    #[error("schedule {0} not found")]
    NotFound(ScheduleId),

    #[error("schedule {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        id: ScheduleId,
        expected: u64,
        actual: u64,
    },

    #[error("an active schedule {existing} already exists for this vendor and add-on")]
    ActiveScheduleExists { existing: ScheduleId },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by lifecycle operations. A failed operation never leaves a
/// partial write behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("actor {actor} is not allowed to {action}")]
    Forbidden { actor: ActorId, action: Action },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("subscription {subscription} does not actively cover add-on {addon}")]
    SubscriptionInactive {
        subscription: SubscriptionId,
        addon: AddonId,
    },

    #[error("no transition from {from} to {to}")]
    InvalidTransition {
        from: ScheduleStatus,
        to: ScheduleStatus,
    },

    #[error("transition guard not satisfied: {0}")]
    GuardNotSatisfied(#[from] GuardFailure),

    #[error("schedule {0} not found")]
    NotFound(ScheduleId),

    #[error(transparent)]
    Storage(StoreError),
}

impl LifecycleError {
    pub fn validation(message: impl Into<String>) -> Self {
        LifecycleError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Forbidden { .. }
            | LifecycleError::Validation(_)
            | LifecycleError::InvalidTransition { .. }
            | LifecycleError::NotFound(_) => ErrorKind::Client,
            LifecycleError::SubscriptionInactive { .. } | LifecycleError::GuardNotSatisfied(_) => {
                ErrorKind::Precondition
            }
            LifecycleError::Storage(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => LifecycleError::NotFound(id),
            StoreError::ActiveScheduleExists { existing } => LifecycleError::Validation(format!(
                "an active schedule {existing} already exists for this vendor and add-on"
            )),
            other => LifecycleError::Storage(other),
        }
    }
}

/// Notification delivery failed. Reported to the caller as a partial success
/// and retried by the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeliveryError {
    #[error("no recipient address for vendor")]
    MissingRecipient,

    #[error("message rejected by channel: {0}")]
    Rejected(String),

    #[error("delivery channel unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn store_errors_map_to_lifecycle_taxonomy() {
        let id = ScheduleId::from_ulid(Ulid::new());

        let not_found: LifecycleError = StoreError::NotFound(id).into();
        assert_eq!(not_found, LifecycleError::NotFound(id));

        let active: LifecycleError = StoreError::ActiveScheduleExists { existing: id }.into();
        assert!(matches!(active, LifecycleError::Validation(_)));

        let down: LifecycleError = StoreError::Unavailable("disk".into()).into();
        assert_eq!(down.kind(), ErrorKind::Infrastructure);
        assert!(down.is_retryable());
    }

    #[test]
    fn guard_failures_are_preconditions() {
        let err: LifecycleError = GuardFailure::MissingCancellationReason.into();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("cancellation reason"));
    }
}
