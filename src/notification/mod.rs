//! The fan-out delivery core.
//!
//! An event flows through the pieces in this order:
//!
//! - `RecipientResolver`: who should hear about it (and their push tokens)
//! - `composer` / `transitions`: what they are told
//! - `DeliveryFanout`: one multicast push with per-address outcomes
//! - `NotificationLogWriter`: one in-app log entry per recipient, atomically
//! - `hygiene`: which push addresses failed and should be invalidated
//!
//! `EventDispatcher` wires them together for the three record flows and
//! returns a structured `InvocationOutcome` for every event.

pub mod composer;
mod dispatcher;
mod fanout;
pub mod hygiene;
mod log_writer;
mod resolver;
pub mod transitions;
mod types;

pub use composer::{compose, NotificationFields};
pub use dispatcher::{
    DispatcherStatsSnapshot, EventDispatcher, InvocationError, InvocationOutcome, SkipReason,
};
pub use fanout::{DeliveryFanout, FanoutReport};
pub use hygiene::{report_invalid, StaleTokenHandler};
pub use log_writer::NotificationLogWriter;
pub use resolver::{push_targets, RecipientCriteria, RecipientResolver};
pub use transitions::{map_transition, StateTransitionRule};
pub use types::{
    DeliveryOutcome, Notification, NotificationBuilder, NotificationCategory, NotificationKind,
    NotificationLogEntry, PendingLogEntry, PushMessage, Recipient, DATA_TYPE_KEY,
};
