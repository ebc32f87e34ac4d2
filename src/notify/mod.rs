//! Notification engine: rule table, dispatcher, presence, and delivery
//!
//! This module provides:
//! - `EventKind` / `EventContext`: typed events fired by business operations
//! - `rule_for`: the static routing/rendering rule table
//! - `NotificationDispatcher`: recipient resolution and row fan-out
//! - `PresenceRegistry`: in-memory user → channel multimap
//! - `DeliverySubsystem`: real-time push, queued redelivery, acknowledgement

mod delivery;
mod dispatcher;
mod presence;
pub mod rules;
mod types;

pub use delivery::DeliverySubsystem;
pub use dispatcher::NotificationDispatcher;
pub use presence::{ChannelHandle, PresenceRegistry};
pub use rules::{rule_for, NotificationRule};
pub use types::{EventContext, EventKind};
