//! In-memory presence registry
//!
//! Tracks which users currently hold an open real-time channel. Purely
//! process-local: entries are rebuilt from scratch on restart, so a user must
//! re-establish a channel to be considered present again.

use crate::store::models::NotificationNode;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle to one open real-time channel.
///
/// Pushing is a send into the channel's outbound queue; the WebSocket writer
/// task on the other end drains it into the socket.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    pub id: Uuid,
    sender: mpsc::UnboundedSender<NotificationNode>,
}

impl ChannelHandle {
    /// Create a handle and the receiving half for the writer task
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationNode>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                sender,
            },
            receiver,
        )
    }

    /// Queue a notification for this channel. Fails when the channel's
    /// writer task has gone away.
    pub fn push(&self, notification: NotificationNode) -> bool {
        self.sender.send(notification).is_ok()
    }
}

/// Multimap user id → open channel handles. Safe for concurrent mutation
/// from many request workers.
#[derive(Default)]
pub struct PresenceRegistry {
    channels: DashMap<Uuid, Vec<ChannelHandle>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel for a user. Idempotent on channel id.
    pub fn register(&self, user_id: Uuid, handle: ChannelHandle) {
        let mut entry = self.channels.entry(user_id).or_default();
        if !entry.iter().any(|h| h.id == handle.id) {
            entry.push(handle);
        }
    }

    /// Remove a channel for a user. Idempotent; removes the user entry when
    /// its channel set becomes empty.
    pub fn unregister(&self, user_id: Uuid, channel_id: Uuid) {
        if let Some(mut entry) = self.channels.get_mut(&user_id) {
            entry.retain(|h| h.id != channel_id);
            if entry.is_empty() {
                drop(entry);
                self.channels.remove_if(&user_id, |_, handles| handles.is_empty());
            }
        }
    }

    /// A user is present iff their channel set is non-empty
    pub fn is_present(&self, user_id: Uuid) -> bool {
        self.channels
            .get(&user_id)
            .map(|handles| !handles.is_empty())
            .unwrap_or(false)
    }

    /// Snapshot of a user's open channels
    pub fn channels_for(&self, user_id: Uuid) -> Vec<ChannelHandle> {
        self.channels
            .get(&user_id)
            .map(|handles| handles.clone())
            .unwrap_or_default()
    }

    /// Number of users currently present
    pub fn present_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_until_registered() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        assert!(!registry.is_present(user));

        let (handle, _rx) = ChannelHandle::new();
        registry.register(user, handle);
        assert!(registry.is_present(user));
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (handle, _rx) = ChannelHandle::new();

        registry.register(user, handle.clone());
        registry.register(user, handle);
        assert_eq!(registry.channels_for(user).len(), 1);
    }

    #[test]
    fn test_multiple_channels_per_user() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (first, _rx1) = ChannelHandle::new();
        let (second, _rx2) = ChannelHandle::new();

        registry.register(user, first);
        registry.register(user, second);
        assert_eq!(registry.channels_for(user).len(), 2);
    }

    #[test]
    fn test_unregister_last_channel_makes_absent() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (handle, _rx) = ChannelHandle::new();
        let channel_id = handle.id;

        registry.register(user, handle);
        registry.unregister(user, channel_id);
        assert!(!registry.is_present(user));

        // Unregistering again is a no-op
        registry.unregister(user, channel_id);
        assert!(!registry.is_present(user));
    }

    #[test]
    fn test_push_reaches_receiver() {
        let (handle, mut rx) = ChannelHandle::new();
        let n = NotificationNode::new(Uuid::new_v4(), "task_assigned", Uuid::new_v4(), "m".into());
        assert!(handle.push(n.clone()));
        assert_eq!(rx.try_recv().unwrap().id, n.id);
    }

    #[test]
    fn test_push_fails_after_receiver_dropped() {
        let (handle, rx) = ChannelHandle::new();
        drop(rx);
        let n = NotificationNode::new(Uuid::new_v4(), "task_assigned", Uuid::new_v4(), "m".into());
        assert!(!handle.push(n));
    }
}
