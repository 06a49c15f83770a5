//! 外部コラボレータ（読み取り専用）
//!
//! エンジンはカタログ・サブスクリプション・ID/権限の各サービスを所有しない。
//! ここで定義する trait 越しに事実を読むだけ。

use async_trait::async_trait;

use crate::domain::{
    ActorId, AddonId, AddonService, Capabilities, StoreError, Subscription, SubscriptionId,
    VendorId,
};

/// Catalog: resolves add-on services for notification content.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn addon(&self, id: AddonId) -> Result<Option<AddonService>, StoreError>;
}

/// Subscription service: resolves subscriptions for the scheduling gate.
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    async fn subscription(&self, id: SubscriptionId) -> Result<Option<Subscription>, StoreError>;
}

/// Identity/permission service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// `None` means the actor is unknown (treated as unauthorized).
    async fn capabilities(&self, actor: ActorId) -> Result<Option<Capabilities>, StoreError>;

    /// Address notifications for `vendor` are delivered to.
    async fn vendor_contact(&self, vendor: VendorId) -> Result<Option<String>, StoreError>;
}
