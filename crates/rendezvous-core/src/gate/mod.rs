//! Gates - 状態を変更する前に参照する読み取り専用の判定

pub mod authorization;
pub mod subscription;

pub use self::authorization::authorize;
pub use self::subscription::SubscriptionGate;
