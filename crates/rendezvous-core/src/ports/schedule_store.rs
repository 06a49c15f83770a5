//! ScheduleStore port - schedule レコードの正本（source of truth）
//!
//! # 設計原則
//! - レコードは `id` で引く。物理削除はしない（cancelled も 1 レコードとして残る）
//! - 更新は `version` による compare-and-swap。同じ schedule への並行更新は
//!   どちらか一方だけがコミットでき、負けた側は `VersionConflict` を受け取る
//! - `(vendor, addon, status)` の二次インデックスで「有効な schedule が既にあるか」を引ける

use async_trait::async_trait;

use crate::domain::{AddonId, Schedule, ScheduleId, ScheduleStatus, StoreError, VendorId};

/// insert 時に「有効な schedule は (vendor, addon) ごとに 1 件まで」を強制するか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertPolicy {
    /// 履歴として複数の有効 schedule を許す
    #[default]
    AllowConcurrent,
    /// 既に有効な schedule があれば `ActiveScheduleExists`
    RejectIfActive,
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Persist a new schedule. The existence check for `RejectIfActive` is
    /// atomic with the insert.
    async fn insert(&self, schedule: Schedule, policy: InsertPolicy) -> Result<(), StoreError>;

    async fn get(&self, id: ScheduleId) -> Result<Option<Schedule>, StoreError>;

    /// Replace the stored record iff its version still equals
    /// `expected_version`.
    async fn replace(&self, schedule: Schedule, expected_version: u64) -> Result<(), StoreError>;

    /// Secondary-index lookup on `(vendor, addon, status)`, oldest first.
    async fn find(
        &self,
        vendor: VendorId,
        addon: AddonId,
        statuses: &[ScheduleStatus],
    ) -> Result<Vec<Schedule>, StoreError>;

    /// All schedules for a vendor, oldest first.
    async fn list_by_vendor(&self, vendor: VendorId) -> Result<Vec<Schedule>, StoreError>;
}
