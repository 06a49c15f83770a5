//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! すべての ID は ULID (Universally Unique Lexicographically Sortable Identifier) です。
//! Phantom type パターンで `ScheduleId` と `VendorId` などを型レベルで区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 作成順に並ぶので schedule 一覧の既定順序にそのまま使える
//! - **分散生成可能**: 調整なしで複数ノードで生成できる
//!
//! 外部コラボレータ（カタログ、サブスクリプション、ID サービス）が持つ ID も
//! 同じ `Id<T>` で受け取ります。エンジンはそれらを参照として保持するだけです。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"sched-", "addon-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// 表示形式（"sched-01J..."）とプレフィックスなしの ULID の両方を受け付ける。
impl<T: IdMarker> FromStr for Id<T> {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).map(Self::from_ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Schedule のマーカー型
    Schedule,
    "sched-"
);
id_marker!(
    /// AddonService のマーカー型
    Addon,
    "addon-"
);
id_marker!(
    /// Vendor のマーカー型
    Vendor,
    "vendor-"
);
id_marker!(
    /// Subscription のマーカー型
    Subscription,
    "sub-"
);
id_marker!(
    /// 操作主体（ユーザー）のマーカー型
    Actor,
    "actor-"
);

/// Identifier of a Schedule (the engine's own entity).
pub type ScheduleId = Id<Schedule>;

/// Identifier of an add-on service in the external catalog.
pub type AddonId = Id<Addon>;

/// Identifier of a vendor account.
pub type VendorId = Id<Vendor>;

/// Identifier of a vendor subscription.
pub type SubscriptionId = Id<Subscription>;

/// Identifier of an authenticated actor.
pub type ActorId = Id<Actor>;
