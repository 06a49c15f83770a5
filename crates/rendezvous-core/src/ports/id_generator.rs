//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻 + 乱数で ULID を生成

use crate::domain::ids::ScheduleId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は schedule の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数リクエストから同時に使われる）
pub trait IdGenerator: Send + Sync {
    fn generate_schedule_id(&self) -> ScheduleId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使うので、FixedClock なら timestamp 部分が決定的になる。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_schedule_id(&self) -> ScheduleId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        ScheduleId::from(ulid)
    }
}
