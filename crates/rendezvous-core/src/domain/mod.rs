//! Domain model (IDs, schedules, catalog facts, capabilities, errors).
//!
//! このモジュールは永続化や配送の方法を知らない。純粋なデータと不変条件のみ。

pub mod actor;
pub mod catalog;
pub mod errors;
pub mod events;
pub mod ids;
pub mod schedule;
pub mod state;

pub use actor::{Action, Capabilities, Role, Scope};
pub use catalog::{AddonService, BillingType, Price, Subscription, SubscriptionStatus};
pub use errors::{DeliveryError, ErrorKind, GuardFailure, LifecycleError, StoreError};
pub use events::EventKind;
pub use ids::{ActorId, AddonId, ScheduleId, SubscriptionId, VendorId};
pub use schedule::{NewSchedule, Note, NoteKind, Schedule, ScheduleDetail};
pub use state::{Priority, ScheduleStatus};
