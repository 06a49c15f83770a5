//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryScheduleStore**: version による CAS 付きの schedule ストア
//! - **InMemoryAuditLedger**: 追記専用ノート
//! - **InMemoryDirectory**: カタログ / サブスクリプション / ID サービスの代役
//! - **EmailDispatcher**: メール形式の通知組み立て
//! - **RecordingChannel**: 送信内容を記録する配送チャネル
//!
//! 本番用の実装（DB、SMTP など）は別クレートに置く想定。

pub mod channel;
pub mod email;
pub mod inmem_directory;
pub mod inmem_ledger;
pub mod inmem_store;

pub use self::channel::RecordingChannel;
pub use self::email::EmailDispatcher;
pub use self::inmem_directory::InMemoryDirectory;
pub use self::inmem_ledger::InMemoryAuditLedger;
pub use self::inmem_store::InMemoryScheduleStore;
