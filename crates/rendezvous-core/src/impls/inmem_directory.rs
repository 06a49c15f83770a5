//! InMemoryDirectory - 開発用のカタログ / サブスクリプション / ID サービス
//!
//! 3 つの読み取り専用ポートを 1 つの構造体で実装する。
//! 本番では外部サービスのクライアントに置き換える。

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{
    ActorId, AddonId, AddonService, Capabilities, StoreError, Subscription, SubscriptionId,
    VendorId,
};
use crate::ports::{CatalogService, IdentityService, SubscriptionService};

#[derive(Default)]
struct DirectoryState {
    addons: HashMap<AddonId, AddonService>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    actors: HashMap<ActorId, Capabilities>,
    contacts: HashMap<VendorId, String>,
}

/// ロック中に await しないので std の RwLock で十分
#[derive(Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_addon(&self, addon: AddonService) {
        self.write().addons.insert(addon.id, addon);
    }

    pub fn put_subscription(&self, subscription: Subscription) {
        self.write()
            .subscriptions
            .insert(subscription.id, subscription);
    }

    pub fn put_actor(&self, capabilities: Capabilities) {
        self.write().actors.insert(capabilities.actor, capabilities);
    }

    pub fn put_vendor_contact(&self, vendor: VendorId, address: impl Into<String>) {
        self.write().contacts.insert(vendor, address.into());
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CatalogService for InMemoryDirectory {
    async fn addon(&self, id: AddonId) -> Result<Option<AddonService>, StoreError> {
        Ok(self.read().addons.get(&id).cloned())
    }
}

#[async_trait]
impl SubscriptionService for InMemoryDirectory {
    async fn subscription(&self, id: SubscriptionId) -> Result<Option<Subscription>, StoreError> {
        Ok(self.read().subscriptions.get(&id).cloned())
    }
}

#[async_trait]
impl IdentityService for InMemoryDirectory {
    async fn capabilities(&self, actor: ActorId) -> Result<Option<Capabilities>, StoreError> {
        Ok(self.read().actors.get(&actor).cloned())
    }

    async fn vendor_contact(&self, vendor: VendorId) -> Result<Option<String>, StoreError> {
        Ok(self.read().contacts.get(&vendor).cloned())
    }
}
