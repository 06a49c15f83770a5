//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **EngineBuilder**: エンジンの構築とワイヤリング
//! - **LifecycleEngine**: 認可 → 計画 → CAS 書き込み → 監査 → 通知
//! - **transition**: 遷移表とガード（純粋関数）
//! - **DeliveryPipeline**: 通知の配送・バックオフ再送・dead letter

pub mod builder;
pub mod delivery;
pub mod engine;
pub mod retry;
pub mod transition;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, EngineBuilder};
pub use self::delivery::{DeliveryJob, DeliveryJobId, DeliveryPipeline, DeliveryStatus, DrainReport};
pub use self::engine::{Committed, LifecycleEngine};
pub use self::retry::RetryPolicy;
pub use self::transition::StatusUpdate;
