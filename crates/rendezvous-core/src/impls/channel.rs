//! RecordingChannel - 送信内容をメモリに溜める MessageChannel
//!
//! テストとデモ用。`fail_next(n)` で次の n 回の送信を失敗させられる。

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::DeliveryError;
use crate::ports::{Ack, MessageChannel, OutboundMessage};

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<OutboundMessage>>,
    remaining_failures: AtomicU32,
    next_id: AtomicU64,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` sends fail with `DeliveryError::Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.remaining_failures.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(&self, message: OutboundMessage) -> Result<Ack, DeliveryError> {
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DeliveryError::Unavailable("intentional failure".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
        Ok(Ack {
            message_id: format!("msg-{id}"),
            delivered_at: Utc::now(),
        })
    }
}
