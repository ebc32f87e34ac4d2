//! Delivery subsystem
//!
//! Pushes notifications to present users, leaves them queued for absent
//! users, and redelivers the queue when a user comes back. The push itself is
//! at-least-once; the `delivered_at` claim is exactly-once (CAS in the store).

use super::presence::{ChannelHandle, PresenceRegistry};
use crate::store::{EntityStore, NotificationNode};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Delivers notification rows to users' open channels
pub struct DeliverySubsystem {
    store: Arc<dyn EntityStore>,
    presence: Arc<PresenceRegistry>,
    /// Users with a catch-up sweep currently in flight. Guards against two
    /// channel-opens racing on the same pending rows; scoped per user,
    /// never global.
    sweeping: DashMap<Uuid, ()>,
}

impl DeliverySubsystem {
    pub fn new(store: Arc<dyn EntityStore>, presence: Arc<PresenceRegistry>) -> Self {
        Self {
            store,
            presence,
            sweeping: DashMap::new(),
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Deliver a freshly persisted notification.
    ///
    /// Present recipient: push over every open channel, then try to claim
    /// `delivered_at`. Losing the claim means another attempt already owns
    /// the durability marker; the extra push is the accepted at-least-once
    /// slack. Absent recipient: the row stays queued with
    /// `delivered_at = null` until the user next opens a channel.
    pub async fn deliver(&self, notification: &NotificationNode) {
        let channels = self.presence.channels_for(notification.recipient);
        if channels.is_empty() {
            debug!(
                recipient = %notification.recipient,
                kind = %notification.kind,
                "recipient absent, notification queued"
            );
            return;
        }

        self.push_to_channels(notification, &channels);

        match self
            .store
            .claim_notification_delivered(notification.id, Utc::now())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(id = %notification.id, "delivery claim lost, already marked");
            }
            Err(e) => {
                warn!(id = %notification.id, "failed to claim delivery: {e:#}");
            }
        }
    }

    /// A user opened a channel: register it, then redeliver their queue.
    pub async fn on_channel_open(&self, user_id: Uuid, handle: ChannelHandle) {
        self.presence.register(user_id, handle);
        self.sweep_pending(user_id).await;
    }

    /// A user closed a channel.
    pub fn on_channel_close(&self, user_id: Uuid, channel_id: Uuid) {
        self.presence.unregister(user_id, channel_id);
    }

    /// Redeliver queued notifications for a user, oldest first.
    ///
    /// At most one sweep per user runs at a time; claims make each row
    /// deliver exactly once even when a concurrent `deliver` races the sweep.
    async fn sweep_pending(&self, user_id: Uuid) {
        // Per-user in-flight flag; the entry API locks the shard, so exactly
        // one of two simultaneous opens wins the insert
        match self.sweeping.entry(user_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(user = %user_id, "pending sweep already running, skipping");
                return;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        if let Err(e) = self.run_sweep(user_id).await {
            warn!(user = %user_id, "pending notification sweep failed: {e:#}");
        }

        self.sweeping.remove(&user_id);
    }

    async fn run_sweep(&self, user_id: Uuid) -> anyhow::Result<()> {
        let pending = self.store.list_pending_notifications(user_id).await?;
        if pending.is_empty() {
            return Ok(());
        }

        debug!(user = %user_id, count = pending.len(), "redelivering queued notifications");

        for notification in pending {
            // Claim before pushing: only the sweep that wins the CAS may
            // push, so a redelivered row is pushed once per notification,
            // not once per channel-open
            let claimed = self
                .store
                .claim_notification_delivered(notification.id, Utc::now())
                .await?;
            if !claimed {
                continue;
            }

            let channels = self.presence.channels_for(user_id);
            if channels.is_empty() {
                // User vanished mid-sweep; the claim stands, the push is lost
                // at the transport level. Acceptable: the row is marked
                // delivered and remains readable via the list endpoint
                break;
            }
            self.push_to_channels(&notification, &channels);
        }

        Ok(())
    }

    /// Acknowledge reads. Only rows owned by `user_id` among `ids` are
    /// touched; foreign ids are silently ignored.
    pub async fn ack(&self, user_id: Uuid, ids: &[Uuid]) -> anyhow::Result<usize> {
        self.store
            .mark_notifications_read(user_id, ids, Utc::now())
            .await
    }

    /// Best-effort push to every channel; a dead channel is logged and
    /// skipped, it never affects the other channels
    fn push_to_channels(&self, notification: &NotificationNode, channels: &[ChannelHandle]) {
        for channel in channels {
            if !channel.push(notification.clone()) {
                debug!(
                    channel = %channel.id,
                    recipient = %notification.recipient,
                    "push to closed channel dropped"
                );
            }
        }
    }
}
