use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use ulid::Ulid;

use rendezvous_core::app::{EngineBuilder, LifecycleEngine, StatusUpdate};
use rendezvous_core::config::EngineConfig;
use rendezvous_core::domain::{
    ActorId, AddonId, AddonService, BillingType, Capabilities, DeliveryError, LifecycleError,
    NewSchedule, Price, Priority, Role, ScheduleId, ScheduleStatus, Scope, Subscription,
    SubscriptionId, SubscriptionStatus, VendorId,
};
use rendezvous_core::impls::{InMemoryAuditLedger, InMemoryDirectory, InMemoryScheduleStore};
use rendezvous_core::ports::{Ack, Clock, FixedClock, MessageChannel, OutboundMessage};

/// rendezvous - service appointment lifecycle engine
#[derive(Parser, Debug)]
#[command(name = "rendezvous")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk a schedule through its lifecycle against in-memory adapters
    Demo {
        /// Make the first N message sends fail to exercise redelivery
        #[arg(long, default_value = "0")]
        fail_deliveries: u32,
    },

    /// Validate the configuration and print the effective values
    CheckConfig,
}

/// 標準出力に書くだけの配送チャネル
///
/// `remaining_failures` 回だけ意図的に失敗する。
struct StdoutChannel {
    remaining_failures: AtomicU32,
    next_id: AtomicU64,
}

impl StdoutChannel {
    fn new(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl MessageChannel for StdoutChannel {
    async fn send(&self, message: OutboundMessage) -> Result<Ack, DeliveryError> {
        if let Ok(left) = self.remaining_failures.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |left| left.checked_sub(1),
        ) {
            return Err(DeliveryError::Unavailable(format!(
                "intentional failure (left={left})"
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        println!(
            "--- mail #{id} ---\nFrom: {}\nTo: {}\nSubject: {}\n\n{}\n",
            message.from, message.to, message.subject, message.body
        );
        Ok(Ack {
            message_id: format!("stdout-{id}"),
            delivered_at: Utc::now(),
        })
    }
}

fn print_json<T: Serialize>(label: &str, value: &T) -> Result<()> {
    println!("{label}: {}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_rejection(label: &str, err: &LifecycleError) {
    println!("{label}: rejected ({:?}) {err}", err.kind());
}

/// デモ用の登場人物
struct Cast {
    admin: ActorId,
    operator: ActorId,
    vendor: VendorId,
    addon: AddonId,
    subscription: SubscriptionId,
}

fn seed(directory: &InMemoryDirectory, clock: &FixedClock) -> Cast {
    let cast = Cast {
        admin: ActorId::from_ulid(Ulid::new()),
        operator: ActorId::from_ulid(Ulid::new()),
        vendor: VendorId::from_ulid(Ulid::new()),
        addon: AddonId::from_ulid(Ulid::new()),
        subscription: SubscriptionId::from_ulid(Ulid::new()),
    };

    directory.put_actor(Capabilities::new(cast.admin).with_role(Role::Admin));
    directory.put_actor(
        Capabilities::new(cast.operator)
            .with_role(Role::Member)
            .with_scope(Scope::Status),
    );
    directory.put_vendor_contact(cast.vendor, "frontdesk@harborview.example");
    directory.put_addon(AddonService {
        id: cast.addon,
        name: "Professional Photography".into(),
        description: "Twenty edited listing photos".into(),
        price: Price::new(19_900, "USD"),
        billing_type: BillingType::OneTime,
        category: "marketing".into(),
    });
    directory.put_subscription(Subscription {
        id: cast.subscription,
        vendor: cast.vendor,
        status: SubscriptionStatus::Active,
        starts_at: clock.now() - Duration::days(30),
        ends_at: clock.now() + Duration::days(335),
        addons: BTreeSet::from([cast.addon]),
    });
    cast
}

fn booking(cast: &Cast, clock: &FixedClock) -> NewSchedule {
    NewSchedule {
        addon: cast.addon,
        vendor: cast.vendor,
        subscription: cast.subscription,
        scheduled_date: Some(clock.now() + Duration::days(1)),
        priority: Priority::High,
        email_subject: "Your photography session is booked".into(),
        email_message: "The photographer will arrive at 10:00.".into(),
    }
}

async fn walk_lifecycle(
    engine: &LifecycleEngine,
    cast: &Cast,
    clock: &FixedClock,
) -> Result<Vec<ScheduleId>> {
    let created = engine.create_schedule(booking(cast, clock), cast.admin).await?;
    print_json("created", &created)?;
    let first = created.schedule.id;

    engine
        .add_note(first, "Gate code is 4412", cast.admin)
        .await?;

    match engine
        .update_status(
            first,
            StatusUpdate::to(ScheduleStatus::Cancelled).with_cancellation_reason(""),
            cast.operator,
        )
        .await
    {
        Ok(unexpected) => print_json("cancel without reason", &unexpected)?,
        Err(err) => print_rejection("cancel without reason", &err),
    }
    if let Err(err) = engine
        .update_status(first, StatusUpdate::to(ScheduleStatus::Completed), cast.operator)
        .await
    {
        print_rejection("complete before date", &err);
    }

    clock.advance(Duration::days(1));
    let started = engine
        .update_status(
            first,
            StatusUpdate::to(ScheduleStatus::InProgress).with_vendor_response("On site"),
            cast.operator,
        )
        .await?;
    print_json("in progress", &started)?;
    let completed = engine
        .update_status(first, StatusUpdate::to(ScheduleStatus::Completed), cast.operator)
        .await?;
    print_json("completed", &completed)?;

    let second = engine
        .create_schedule(booking(cast, clock), cast.admin)
        .await?
        .schedule;
    let moved = engine
        .reschedule(second.id, second.scheduled_date + Duration::days(2), cast.operator)
        .await?;
    print_json("rescheduled", &moved)?;
    let cancelled = engine
        .update_status(
            second.id,
            StatusUpdate::to(ScheduleStatus::Cancelled).with_cancellation_reason("Listing withdrawn"),
            cast.operator,
        )
        .await?;
    print_json("cancelled", &cancelled)?;

    Ok(vec![first, second.id])
}

async fn demo(config: EngineConfig, fail_deliveries: u32) -> Result<()> {
    let clock = FixedClock::new(Utc::now());
    let directory = Arc::new(InMemoryDirectory::new());
    let cast = seed(&directory, &clock);

    let engine = EngineBuilder::new()
        .config(config.clone())
        .store(Arc::new(InMemoryScheduleStore::new()))
        .ledger(Arc::new(InMemoryAuditLedger::new()))
        .with_directory(directory)
        .channel(Arc::new(StdoutChannel::new(fail_deliveries)))
        .clock(Arc::new(clock.clone()))
        .build()
        .context("failed to build engine")?;

    // 再送ループはバックグラウンドで回す
    let delivery = engine.delivery();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let poll_interval = config.delivery.poll_interval();
    let retry_loop = tokio::spawn(async move {
        delivery
            .run(
                async move {
                    let _ = stop_rx.await;
                },
                poll_interval,
            )
            .await;
    });

    let ids = walk_lifecycle(&engine, &cast, &clock).await?;

    // 時計を次の再送時刻まで進め、キューが空になるのを待つ
    loop {
        let pending = engine.delivery().pending().await;
        let Some(next) = pending.first().and_then(|job| job.next_attempt_at) else {
            break;
        };
        info!(pending = pending.len(), "waiting for redelivery");
        if next > clock.now() {
            clock.set(next);
        }
        tokio::time::sleep(poll_interval * 2).await;
    }
    let _ = stop_tx.send(());
    retry_loop.await.context("retry loop panicked")?;

    for id in ids {
        print_json("detail", &engine.schedule(id).await?)?;
    }
    let dead = engine.delivery().dead_letters().await;
    if !dead.is_empty() {
        print_json("dead letters", &dead)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Demo { fail_deliveries } => demo(config, fail_deliveries).await,
        Commands::CheckConfig => print_json("config", &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> OutboundMessage {
        OutboundMessage {
            from: "no-reply@test".into(),
            to: "vendor@example.com".into(),
            subject: "s".into(),
            body: "b".into(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sends_fail_exactly_the_configured_count() {
        let channel = Arc::new(StdoutChannel::new(3));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let channel = Arc::clone(&channel);
                tokio::spawn(async move { channel.send(message()).await })
            })
            .collect();
        let mut failures = 0;
        for handle in handles {
            if handle.await.unwrap().is_err() {
                failures += 1;
            }
        }

        assert_eq!(failures, 3);
        assert_eq!(channel.remaining_failures.load(Ordering::SeqCst), 0);
        assert!(channel.send(message()).await.is_ok());
    }
}
