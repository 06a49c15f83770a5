//! Read-only facts supplied by external collaborators.
//!
//! The engine never mutates these records. The catalog resolves add-on
//! services for notification content; the subscription service resolves
//! subscriptions for the scheduling gate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AddonId, SubscriptionId, VendorId};

/// How an add-on is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    OneTime,
    Recurring,
}

/// Unit price in minor units (cents) plus ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount_minor: i64,
    pub currency: String,
}

impl Price {
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}

/// A purchasable extra (photography, staging, ...) from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonService {
    pub id: AddonId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub billing_type: BillingType,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

/// A vendor's subscription and the add-ons it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub vendor: VendorId,
    pub status: SubscriptionStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub addons: BTreeSet<AddonId>,
}

impl Subscription {
    /// True iff the subscription is active, not yet ended at `now`, and
    /// covers `addon`.
    pub fn covers(&self, addon: AddonId, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.ends_at > now
            && self.addons.contains(&addon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use ulid::Ulid;

    fn subscription(status: SubscriptionStatus, ends_in: Duration, addon: AddonId) -> Subscription {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Subscription {
            id: SubscriptionId::from_ulid(Ulid::new()),
            vendor: VendorId::from_ulid(Ulid::new()),
            status,
            starts_at: now - Duration::days(30),
            ends_at: now + ends_in,
            addons: BTreeSet::from([addon]),
        }
    }

    #[rstest]
    #[case::active(SubscriptionStatus::Active, Duration::days(1), true)]
    #[case::expired_status(SubscriptionStatus::Expired, Duration::days(1), false)]
    #[case::cancelled(SubscriptionStatus::Cancelled, Duration::days(1), false)]
    #[case::ended(SubscriptionStatus::Active, Duration::seconds(-1), false)]
    #[case::ends_exactly_now(SubscriptionStatus::Active, Duration::zero(), false)]
    fn covers_requires_active_and_future_end(
        #[case] status: SubscriptionStatus,
        #[case] ends_in: Duration,
        #[case] expected: bool,
    ) {
        let addon = AddonId::from_ulid(Ulid::new());
        let sub = subscription(status, ends_in, addon);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        assert_eq!(sub.covers(addon, now), expected);
    }

    #[rstest]
    #[case(12_950, "129.50 USD")]
    #[case(7, "0.07 USD")]
    #[case(0, "0.00 USD")]
    #[case(-50, "-0.50 USD")]
    #[case(-12_950, "-129.50 USD")]
    #[case(i64::MIN, "-92233720368547758.08 USD")]
    fn price_display_keeps_sign(#[case] amount_minor: i64, #[case] expected: &str) {
        assert_eq!(Price::new(amount_minor, "USD").to_string(), expected);
    }

    #[test]
    fn covers_requires_addon_membership() {
        let addon = AddonId::from_ulid(Ulid::new());
        let other = AddonId::from_ulid(Ulid::new());
        let sub = subscription(SubscriptionStatus::Active, Duration::days(1), addon);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        assert!(!sub.covers(other, now));
    }
}
