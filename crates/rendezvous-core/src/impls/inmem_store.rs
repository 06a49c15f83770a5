//! InMemoryScheduleStore - 開発用・テスト用の schedule ストア
//!
//! # 実装詳細
//! - `HashMap<ScheduleId, Schedule>` が正本
//! - `(vendor, addon, status)` → `BTreeSet<ScheduleId>` の二次インデックスを同じロック内で維持
//! - tokio の RwLock で排他制御。読み取りは並行、書き込みは 1 つずつ

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{AddonId, Schedule, ScheduleId, ScheduleStatus, StoreError, VendorId};
use crate::ports::{InsertPolicy, ScheduleStore};

type IndexKey = (VendorId, AddonId, ScheduleStatus);

#[derive(Default)]
struct StoreState {
    records: HashMap<ScheduleId, Schedule>,
    /// ULID は時刻順なので BTreeSet の順序がそのまま作成順になる
    index: HashMap<IndexKey, BTreeSet<ScheduleId>>,
}

impl StoreState {
    fn index_insert(&mut self, schedule: &Schedule) {
        self.index
            .entry((schedule.vendor, schedule.addon, schedule.status))
            .or_default()
            .insert(schedule.id);
    }

    fn index_remove(&mut self, schedule: &Schedule) {
        let key = (schedule.vendor, schedule.addon, schedule.status);
        if let Some(ids) = self.index.get_mut(&key) {
            ids.remove(&schedule.id);
            if ids.is_empty() {
                self.index.remove(&key);
            }
        }
    }

    fn find(&self, vendor: VendorId, addon: AddonId, statuses: &[ScheduleStatus]) -> Vec<Schedule> {
        let mut ids: Vec<ScheduleId> = statuses
            .iter()
            .filter_map(|status| self.index.get(&(vendor, addon, *status)))
            .flatten()
            .copied()
            .collect();
        ids.sort();
        ids.dedup();
        ids.iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryScheduleStore {
    state: RwLock<StoreState>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored schedules (for testing)
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn insert(&self, schedule: Schedule, policy: InsertPolicy) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.records.contains_key(&schedule.id) {
            return Err(StoreError::Duplicate(schedule.id));
        }
        if policy == InsertPolicy::RejectIfActive {
            let active: Vec<ScheduleStatus> = ScheduleStatus::ALL
                .into_iter()
                .filter(|s| s.is_active())
                .collect();
            if let Some(existing) = state.find(schedule.vendor, schedule.addon, &active).first() {
                return Err(StoreError::ActiveScheduleExists {
                    existing: existing.id,
                });
            }
        }
        state.index_insert(&schedule);
        state.records.insert(schedule.id, schedule);
        Ok(())
    }

    async fn get(&self, id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn replace(&self, schedule: Schedule, expected_version: u64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let Some(current) = state.records.get(&schedule.id) else {
            return Err(StoreError::NotFound(schedule.id));
        };
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: schedule.id,
                expected: expected_version,
                actual: current.version,
            });
        }
        let previous = current.clone();
        state.index_remove(&previous);
        state.index_insert(&schedule);
        state.records.insert(schedule.id, schedule);
        Ok(())
    }

    async fn find(
        &self,
        vendor: VendorId,
        addon: AddonId,
        statuses: &[ScheduleStatus],
    ) -> Result<Vec<Schedule>, StoreError> {
        Ok(self.state.read().await.find(vendor, addon, statuses))
    }

    async fn list_by_vendor(&self, vendor: VendorId) -> Result<Vec<Schedule>, StoreError> {
        let state = self.state.read().await;
        let mut schedules: Vec<Schedule> = state
            .records
            .values()
            .filter(|s| s.vendor == vendor)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.id);
        Ok(schedules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorId, NewSchedule, Priority, SubscriptionId};
    use chrono::{TimeZone, Utc};
    use ulid::Ulid;

    fn schedule(vendor: VendorId, addon: AddonId) -> Schedule {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Schedule::new(
            ScheduleId::from_ulid(Ulid::new()),
            now,
            NewSchedule {
                addon,
                vendor,
                subscription: SubscriptionId::from_ulid(Ulid::new()),
                scheduled_date: Some(now),
                priority: Priority::Low,
                email_subject: "s".into(),
                email_message: "m".into(),
            },
            ActorId::from_ulid(Ulid::new()),
            now,
        )
    }

    fn ids() -> (VendorId, AddonId) {
        (
            VendorId::from_ulid(Ulid::new()),
            AddonId::from_ulid(Ulid::new()),
        )
    }

    #[tokio::test]
    async fn insert_then_get() {
        let store = InMemoryScheduleStore::new();
        let (vendor, addon) = ids();
        let s = schedule(vendor, addon);

        store.insert(s.clone(), InsertPolicy::AllowConcurrent).await.unwrap();

        assert_eq!(store.get(s.id).await.unwrap(), Some(s.clone()));
        let dup = store.insert(s.clone(), InsertPolicy::AllowConcurrent).await;
        assert_eq!(dup, Err(StoreError::Duplicate(s.id)));
    }

    #[tokio::test]
    async fn replace_checks_version() {
        let store = InMemoryScheduleStore::new();
        let (vendor, addon) = ids();
        let s = schedule(vendor, addon);
        store.insert(s.clone(), InsertPolicy::AllowConcurrent).await.unwrap();

        let mut first = s.clone();
        first.mark_completed(s.scheduled_date);
        store.replace(first, s.version).await.unwrap();

        let mut second = s.clone();
        second.mark_in_progress(s.scheduled_date);
        let err = store.replace(second, s.version).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 1, actual: 2, .. }));

        let stored = store.get(s.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Completed);
        assert!(stored.in_progress_at.is_none());
    }

    #[tokio::test]
    async fn index_follows_status_changes() {
        let store = InMemoryScheduleStore::new();
        let (vendor, addon) = ids();
        let s = schedule(vendor, addon);
        store.insert(s.clone(), InsertPolicy::AllowConcurrent).await.unwrap();

        let scheduled = store.find(vendor, addon, &[ScheduleStatus::Scheduled]).await.unwrap();
        assert_eq!(scheduled.len(), 1);

        let mut cancelled = s.clone();
        cancelled.mark_cancelled("gone".into(), s.scheduled_date);
        store.replace(cancelled, s.version).await.unwrap();

        assert!(store
            .find(vendor, addon, &[ScheduleStatus::Scheduled])
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.find(vendor, addon, &[ScheduleStatus::Cancelled]).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn reject_if_active_allows_after_terminal() {
        let store = InMemoryScheduleStore::new();
        let (vendor, addon) = ids();
        let first = schedule(vendor, addon);
        store.insert(first.clone(), InsertPolicy::RejectIfActive).await.unwrap();

        let second = schedule(vendor, addon);
        let err = store
            .insert(second.clone(), InsertPolicy::RejectIfActive)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::ActiveScheduleExists { existing: first.id });

        // 履歴としての重複は AllowConcurrent なら許される
        store.insert(second, InsertPolicy::AllowConcurrent).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn list_by_vendor_is_creation_ordered() {
        let store = InMemoryScheduleStore::new();
        let (vendor, addon) = ids();
        let a = schedule(vendor, addon);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = schedule(vendor, addon);
        store.insert(b.clone(), InsertPolicy::AllowConcurrent).await.unwrap();
        store.insert(a.clone(), InsertPolicy::AllowConcurrent).await.unwrap();
        store
            .insert(schedule(VendorId::from_ulid(Ulid::new()), addon), InsertPolicy::AllowConcurrent)
            .await
            .unwrap();

        let listed: Vec<ScheduleId> = store
            .list_by_vendor(vendor)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(listed, vec![a.id, b.id]);
    }
}
