//! EmailDispatcher - NotificationDispatcher のメール実装
//!
//! 件名・本文を組み立てて MessageChannel に渡すだけ。テンプレートエンジンは使わない。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DeliveryError, EventKind, Schedule};
use crate::ports::{Ack, MessageChannel, NotificationContext, NotificationDispatcher, OutboundMessage};

pub struct EmailDispatcher {
    sender: String,
    channel: Arc<dyn MessageChannel>,
}

impl EmailDispatcher {
    pub fn new(sender: impl Into<String>, channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            sender: sender.into(),
            channel,
        }
    }
}

/// Subject and body for `kind`.
///
/// The creation notice reuses the subject/message recorded on the schedule;
/// every later event gets a generated message.
pub fn render(schedule: &Schedule, kind: EventKind, context: &NotificationContext) -> (String, String) {
    let service = context
        .addon
        .as_ref()
        .map(|addon| addon.name.clone())
        .unwrap_or_else(|| "Add-on service".to_string());
    let when = schedule.scheduled_date.format("%Y-%m-%d %H:%M UTC");

    match kind {
        EventKind::Created => {
            let mut body = schedule.email_message.clone();
            body.push_str(&format!("\n\nService: {service}\nScheduled for: {when}"));
            if let Some(addon) = &context.addon {
                body.push_str(&format!("\nPrice: {}", addon.price));
            }
            (schedule.email_subject.clone(), body)
        }
        EventKind::Rescheduled => {
            let previous = context
                .previous_date
                .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "an earlier date".to_string());
            (
                format!("{service} rescheduled"),
                format!("{service} has been moved from {previous} to {when}."),
            )
        }
        EventKind::InProgress => (
            format!("{service} is in progress"),
            format!("Work on {service} (scheduled for {when}) has started."),
        ),
        EventKind::Completed => {
            let mut body = format!("{service} has been completed.");
            if let Some(response) = &schedule.vendor_response {
                body.push_str(&format!("\n\nVendor response: {response}"));
            }
            (format!("{service} completed"), body)
        }
        EventKind::Cancelled => {
            let reason = schedule
                .cancellation_reason
                .as_deref()
                .unwrap_or("no reason given");
            (
                format!("{service} cancelled"),
                format!("{service} scheduled for {when} has been cancelled.\n\nReason: {reason}"),
            )
        }
    }
}

#[async_trait]
impl NotificationDispatcher for EmailDispatcher {
    async fn dispatch(
        &self,
        schedule: &Schedule,
        kind: EventKind,
        context: &NotificationContext,
    ) -> Result<Ack, DeliveryError> {
        let to = context
            .recipient
            .clone()
            .ok_or(DeliveryError::MissingRecipient)?;
        let (subject, body) = render(schedule, kind, context);
        self.channel
            .send(OutboundMessage {
                from: self.sender.clone(),
                to,
                subject,
                body,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActorId, AddonId, AddonService, BillingType, NewSchedule, Price, Priority, ScheduleId,
        SubscriptionId, VendorId,
    };
    use crate::impls::RecordingChannel;
    use chrono::{Duration, TimeZone, Utc};
    use ulid::Ulid;

    fn fixture() -> (Schedule, NotificationContext) {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let addon = AddonId::from_ulid(Ulid::new());
        let schedule = Schedule::new(
            ScheduleId::from_ulid(Ulid::new()),
            now + Duration::days(2),
            NewSchedule {
                addon,
                vendor: VendorId::from_ulid(Ulid::new()),
                subscription: SubscriptionId::from_ulid(Ulid::new()),
                scheduled_date: Some(now + Duration::days(2)),
                priority: Priority::Medium,
                email_subject: "Your photo shoot is booked".into(),
                email_message: "Our photographer will arrive at 10am.".into(),
            },
            ActorId::from_ulid(Ulid::new()),
            now,
        );
        let context = NotificationContext {
            actor: schedule.scheduled_by,
            addon: Some(AddonService {
                id: addon,
                name: "Photography".into(),
                description: "Professional listing photos".into(),
                price: Price::new(14_900, "USD"),
                billing_type: BillingType::OneTime,
                category: "media".into(),
            }),
            recipient: Some("vendor@example.com".into()),
            previous_date: None,
        };
        (schedule, context)
    }

    #[test]
    fn created_reuses_recorded_subject_and_message() {
        let (schedule, context) = fixture();
        let (subject, body) = render(&schedule, EventKind::Created, &context);

        assert_eq!(subject, "Your photo shoot is booked");
        assert!(body.starts_with("Our photographer will arrive at 10am."));
        assert!(body.contains("Service: Photography"));
        assert!(body.contains("149.00 USD"));
    }

    #[test]
    fn cancelled_includes_reason() {
        let (mut schedule, context) = fixture();
        schedule.mark_cancelled("vendor unavailable".into(), schedule.created_at);

        let (subject, body) = render(&schedule, EventKind::Cancelled, &context);
        assert_eq!(subject, "Photography cancelled");
        assert!(body.contains("Reason: vendor unavailable"));
    }

    #[test]
    fn rescheduled_mentions_both_dates() {
        let (schedule, mut context) = fixture();
        context.previous_date = Some(Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap());

        let (_, body) = render(&schedule, EventKind::Rescheduled, &context);
        assert!(body.contains("2024-03-02 09:00 UTC"));
        assert!(body.contains("2024-03-03 10:00 UTC"));
    }

    #[tokio::test]
    async fn dispatch_sends_through_channel() {
        let (schedule, context) = fixture();
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = EmailDispatcher::new("no-reply@test", channel.clone());

        dispatcher
            .dispatch(&schedule, EventKind::InProgress, &context)
            .await
            .unwrap();

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "no-reply@test");
        assert_eq!(sent[0].to, "vendor@example.com");
        assert_eq!(sent[0].subject, "Photography is in progress");
    }

    #[tokio::test]
    async fn dispatch_without_recipient_fails() {
        let (schedule, mut context) = fixture();
        context.recipient = None;
        let dispatcher = EmailDispatcher::new("no-reply@test", Arc::new(RecordingChannel::new()));

        let err = dispatcher
            .dispatch(&schedule, EventKind::Created, &context)
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::MissingRecipient);
    }
}
