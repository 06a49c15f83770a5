//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。エンジンが外部に求めるものはすべて
//! ここの trait で表現し、構築時に注入する（グローバル状態には頼らない）。
//!
//! # 設計原則
//! - ScheduleStore が schedule 状態の正本
//! - AuditLedger はノートの正本（追記専用）
//! - 通知は NotificationDispatcher → MessageChannel の順に委譲

pub mod audit_ledger;
pub mod clock;
pub mod directory;
pub mod id_generator;
pub mod notifier;
pub mod schedule_store;

pub use self::audit_ledger::{AuditLedger, LedgerView};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::directory::{CatalogService, IdentityService, SubscriptionService};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notifier::{
    Ack, MessageChannel, NotificationContext, NotificationDispatcher, OutboundMessage,
};
pub use self::schedule_store::{InsertPolicy, ScheduleStore};
