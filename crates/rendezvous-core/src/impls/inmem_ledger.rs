//! InMemoryAuditLedger - 開発用の追記専用ノート
//!
//! schedule ごとに `Vec<Note>` を持つ。`list` はその時点のコピーを返すので、
//! 読み取り側が書き込みをブロックし続けることはない。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Note, ScheduleId, StoreError};
use crate::ports::{AuditLedger, LedgerView};

#[derive(Default)]
pub struct InMemoryAuditLedger {
    entries: RwLock<HashMap<ScheduleId, Vec<Note>>>,
}

impl InMemoryAuditLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLedger for InMemoryAuditLedger {
    async fn append(&self, schedule_id: ScheduleId, entry: Note) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .entry(schedule_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn list(&self, schedule_id: ScheduleId) -> Result<LedgerView, StoreError> {
        let entries = self.entries.read().await;
        let snapshot: Arc<[Note]> = entries
            .get(&schedule_id)
            .map(|notes| Arc::from(notes.as_slice()))
            .unwrap_or_default();
        Ok(LedgerView::new(snapshot))
    }
}
