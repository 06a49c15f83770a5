//! AuditLedger port - schedule ごとの追記専用ノート
//!
//! # 設計原則
//! - 追記のみ。一度書いたエントリは変更も削除もしない
//! - `list` は挿入順のスナップショットを返す。何度でも最初から走査し直せる
//! - 挿入順はコミット順と一致しない場合がある（並行する更新は CAS の後に追記する）。
//!   エンジンが書いたエントリは `Note::schedule_version` で順序付けできる

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Note, ScheduleId, StoreError};

#[async_trait]
pub trait AuditLedger: Send + Sync {
    async fn append(&self, schedule_id: ScheduleId, entry: Note) -> Result<(), StoreError>;

    async fn list(&self, schedule_id: ScheduleId) -> Result<LedgerView, StoreError>;
}

/// Insertion-ordered snapshot of a schedule's entries.
///
/// Iteration is lazy and restartable: `iter()` can be called any number of
/// times and always starts from the first entry.
#[derive(Debug, Clone, Default)]
pub struct LedgerView {
    entries: Arc<[Note]>,
}

impl LedgerView {
    pub fn new(entries: Arc<[Note]>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Note> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Note> {
        self.entries.to_vec()
    }
}

impl<'a> IntoIterator for &'a LedgerView {
    type Item = &'a Note;
    type IntoIter = std::slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
