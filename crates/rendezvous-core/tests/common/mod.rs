//! 結合テスト用の共通セットアップ

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rendezvous_core::app::{EngineBuilder, LifecycleEngine};
use rendezvous_core::config::EngineConfig;
use rendezvous_core::domain::{
    ActorId, AddonId, AddonService, BillingType, Capabilities, NewSchedule, Price, Priority, Role,
    Schedule, Subscription, SubscriptionId, SubscriptionStatus, VendorId,
};
use rendezvous_core::impls::{
    InMemoryAuditLedger, InMemoryDirectory, InMemoryScheduleStore, RecordingChannel,
};
use rendezvous_core::ports::{Clock, FixedClock};
use ulid::Ulid;

pub struct World {
    pub engine: LifecycleEngine,
    pub store: Arc<InMemoryScheduleStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub channel: Arc<RecordingChannel>,
    pub clock: FixedClock,
    pub admin: ActorId,
    pub vendor: VendorId,
    pub addon: AddonId,
    pub subscription: SubscriptionId,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 15, 8, 30, 0).unwrap()
}

impl World {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::build(config, SubscriptionStatus::Active)
    }

    pub fn with_subscription_status(status: SubscriptionStatus) -> Self {
        Self::build(EngineConfig::default(), status)
    }

    fn build(config: EngineConfig, status: SubscriptionStatus) -> Self {
        let clock = FixedClock::new(t0());
        let store = Arc::new(InMemoryScheduleStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let channel = Arc::new(RecordingChannel::new());

        let admin = ActorId::from_ulid(Ulid::new());
        let vendor = VendorId::from_ulid(Ulid::new());
        let addon = AddonId::from_ulid(Ulid::new());
        let subscription = SubscriptionId::from_ulid(Ulid::new());

        directory.put_actor(Capabilities::new(admin).with_role(Role::SuperAdmin));
        directory.put_vendor_contact(vendor, "frontdesk@harborview.example");
        directory.put_addon(AddonService {
            id: addon,
            name: "Professional Photography".into(),
            description: "Twenty edited listing photos".into(),
            price: Price::new(19_900, "USD"),
            billing_type: BillingType::OneTime,
            category: "marketing".into(),
        });
        directory.put_subscription(Subscription {
            id: subscription,
            vendor,
            status,
            starts_at: t0() - Duration::days(60),
            ends_at: t0() + Duration::days(305),
            addons: BTreeSet::from([addon]),
        });

        let engine = EngineBuilder::new()
            .config(config)
            .store(store.clone())
            .ledger(Arc::new(InMemoryAuditLedger::new()))
            .with_directory(directory.clone())
            .channel(channel.clone())
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        World {
            engine,
            store,
            directory,
            channel,
            clock,
            admin,
            vendor,
            addon,
            subscription,
        }
    }

    /// Scheduled for tomorrow, medium priority.
    pub fn request(&self) -> NewSchedule {
        NewSchedule {
            addon: self.addon,
            vendor: self.vendor,
            subscription: self.subscription,
            scheduled_date: Some(self.clock.now() + Duration::days(1)),
            priority: Priority::Medium,
            email_subject: "Your photography session is booked".into(),
            email_message: "The photographer will arrive at 10:00.".into(),
        }
    }

    pub async fn scenario_a(&self) -> Schedule {
        self.engine
            .create_schedule(self.request(), self.admin)
            .await
            .unwrap()
            .schedule
    }
}
