//! NotificationDispatcher port - ライフサイクルイベントの通知
//!
//! # 二層構造
//! - **NotificationDispatcher**: schedule + イベント種別から送信内容を決める
//! - **MessageChannel**: (宛先, 件名, 本文) を実際に配送するブラックボックス（メールなど）
//!
//! 配送の失敗はコミット済みの状態遷移を取り消さない。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, AddonService, DeliveryError, EventKind, Schedule};

/// Extra facts the dispatcher needs beyond the schedule itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub actor: ActorId,
    /// Catalog entry, when the catalog could resolve it.
    pub addon: Option<AddonService>,
    /// Where the vendor receives messages.
    pub recipient: Option<String>,
    /// Date in effect before a reschedule.
    pub previous_date: Option<DateTime<Utc>>,
}

/// Acknowledgement from the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub message_id: String,
    pub delivered_at: DateTime<Utc>,
}

/// An outbound message, already rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        schedule: &Schedule,
        kind: EventKind,
        context: &NotificationContext,
    ) -> Result<Ack, DeliveryError>;
}

#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<Ack, DeliveryError>;
}
