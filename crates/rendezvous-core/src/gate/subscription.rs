//! SubscriptionGate - 「このベンダーのサブスクリプションはこのアドオンに有効か」
//!
//! 読み取り専用。キャッシュは持たない（必要ならコラボレータ側で行う）。

use std::sync::Arc;

use crate::domain::{AddonId, StoreError, Subscription, SubscriptionId};
use crate::ports::{Clock, SubscriptionService};

pub struct SubscriptionGate {
    service: Arc<dyn SubscriptionService>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionGate {
    pub fn new(service: Arc<dyn SubscriptionService>, clock: Arc<dyn Clock>) -> Self {
        Self { service, clock }
    }

    /// True iff the subscription exists, is active, ends in the future and
    /// covers `addon`.
    pub async fn is_active(
        &self,
        subscription: SubscriptionId,
        addon: AddonId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .resolve_active(subscription, addon)
            .await?
            .is_some())
    }

    /// Like `is_active`, but hands back the subscription so callers can make
    /// further checks (e.g. vendor ownership) without a second lookup.
    pub async fn resolve_active(
        &self,
        subscription: SubscriptionId,
        addon: AddonId,
    ) -> Result<Option<Subscription>, StoreError> {
        let now = self.clock.now();
        let found = self.service.subscription(subscription).await?;
        Ok(found.filter(|sub| sub.covers(addon, now)))
    }
}
