//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 必須ポートが一つでも欠けていれば build() が `BuildError::MissingPorts` を返す
//! - 設定は build() 時に検証する（不正な設定のまま起動しない）
//! - Clock と IdGenerator は省略可（SystemClock / UlidGenerator）

use std::sync::Arc;

use super::delivery::DeliveryPipeline;
use super::engine::LifecycleEngine;
use crate::config::{ConfigError, EngineConfig};
use crate::gate::SubscriptionGate;
use crate::impls::{EmailDispatcher, InMemoryDirectory};
use crate::ports::{
    AuditLedger, CatalogService, Clock, IdGenerator, IdentityService, MessageChannel,
    NotificationDispatcher, ScheduleStore, SubscriptionService, SystemClock, UlidGenerator,
};

/// EngineBuilder は LifecycleEngine を構築
///
/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new()
///     .store(Arc::new(InMemoryScheduleStore::new()))
///     .ledger(Arc::new(InMemoryAuditLedger::new()))
///     .with_directory(directory)
///     .channel(channel)
///     .build()?;
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn ScheduleStore>>,
    ledger: Option<Arc<dyn AuditLedger>>,
    catalog: Option<Arc<dyn CatalogService>>,
    subscriptions: Option<Arc<dyn SubscriptionService>>,
    identity: Option<Arc<dyn IdentityService>>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
    channel: Option<Arc<dyn MessageChannel>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はエンジン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These must be provided before build().")]
    MissingPorts(Vec<&'static str>),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn ScheduleStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn AuditLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogService>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn subscriptions(mut self, subscriptions: Arc<dyn SubscriptionService>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityService>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// catalog / subscriptions / identity を一つのディレクトリでまとめて設定
    pub fn with_directory(self, directory: Arc<InMemoryDirectory>) -> Self {
        self.catalog(directory.clone())
            .subscriptions(directory.clone())
            .identity(directory)
    }

    /// 通知の組み立てと送信を丸ごと差し替える
    pub fn dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// 送信チャネルだけを渡す。メール本文は EmailDispatcher が組み立てる
    /// （送信元は `notifications.sender`）。`dispatcher()` が優先。
    pub fn channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// # 検証
    /// - 設定の妥当性（`EngineConfig::validate`）
    /// - 必須ポート: store, ledger, catalog, subscriptions, identity, dispatcher|channel
    pub fn build(self) -> Result<LifecycleEngine, BuildError> {
        self.config.validate()?;

        let mut missing = Vec::new();
        if self.store.is_none() {
            missing.push("store");
        }
        if self.ledger.is_none() {
            missing.push("ledger");
        }
        if self.catalog.is_none() {
            missing.push("catalog");
        }
        if self.subscriptions.is_none() {
            missing.push("subscriptions");
        }
        if self.identity.is_none() {
            missing.push("identity");
        }
        let sender = self.config.notifications.sender.clone();
        let dispatcher = self.dispatcher.or_else(|| {
            self.channel.map(|channel| {
                Arc::new(EmailDispatcher::new(sender, channel)) as Arc<dyn NotificationDispatcher>
            })
        });
        if dispatcher.is_none() {
            missing.push("dispatcher");
        }

        let (
            Some(store),
            Some(ledger),
            Some(catalog),
            Some(subscriptions),
            Some(identity),
            Some(dispatcher),
        ) = (
            self.store,
            self.ledger,
            self.catalog,
            self.subscriptions,
            self.identity,
            dispatcher,
        )
        else {
            return Err(BuildError::MissingPorts(missing));
        };

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let delivery = Arc::new(DeliveryPipeline::new(
            dispatcher,
            Arc::clone(&clock),
            self.config.delivery.retry_policy(),
        ));

        Ok(LifecycleEngine {
            store,
            ledger,
            catalog,
            identity,
            subscriptions: SubscriptionGate::new(subscriptions, Arc::clone(&clock)),
            delivery,
            clock,
            ids,
            config: self.config.scheduling,
        })
    }
}
