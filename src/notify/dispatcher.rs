//! Notification dispatcher
//!
//! Resolves recipients for a fired event via the rule table, persists one
//! notification row per recipient, and hands each row to the delivery
//! subsystem. Firing is advisory: it logs failures and never propagates an
//! error back into the triggering business operation.

use super::delivery::DeliverySubsystem;
use super::rules::rule_for;
use super::types::{EventContext, EventKind};
use crate::store::{EntityStore, NotificationNode};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Routes business events to notification rows
pub struct NotificationDispatcher {
    store: Arc<dyn EntityStore>,
    delivery: Arc<DeliverySubsystem>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn EntityStore>, delivery: Arc<DeliverySubsystem>) -> Self {
        Self { store, delivery }
    }

    pub fn delivery(&self) -> &Arc<DeliverySubsystem> {
        &self.delivery
    }

    /// Fire an event addressed by its wire string. Unknown strings are a
    /// logged no-op; a misconfigured producer must never abort the
    /// operation that tried to notify.
    pub async fn fire_raw(&self, kind: &str, context: EventContext) {
        match EventKind::parse(kind) {
            Some(kind) => self.fire(kind, context).await,
            None => {
                warn!(kind, "unknown event type, notification dropped");
            }
        }
    }

    /// Fire a typed event: resolve recipients, fan out one row each,
    /// deliver best-effort per recipient.
    pub async fn fire(&self, kind: EventKind, context: EventContext) {
        let rule = rule_for(kind);

        let recipients = match self.resolve_recipients(kind, &context).await {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(kind = %kind, "recipient resolution failed: {e:#}");
                return;
            }
        };

        if recipients.is_empty() {
            debug!(kind = %kind, ref_id = %context.ref_id, "event resolved to no recipients");
            return;
        }

        let message = (rule.render)(&context);

        for recipient in recipients {
            let notification =
                NotificationNode::new(recipient, kind.as_str(), context.ref_id, message.clone());

            // One recipient failing must not starve the rest of the fan-out
            if let Err(e) = self.store.insert_notification(&notification).await {
                warn!(kind = %kind, recipient = %recipient, "failed to persist notification: {e:#}");
                continue;
            }

            self.delivery.deliver(&notification).await;
        }
    }

    /// Union of the rule's specific recipients (pulled out of the context)
    /// and its role broadcast (active users only), de-duplicated while
    /// keeping first-seen order.
    async fn resolve_recipients(
        &self,
        kind: EventKind,
        context: &EventContext,
    ) -> anyhow::Result<Vec<Uuid>> {
        let rule = rule_for(kind);

        let mut seen = HashSet::new();
        let mut recipients = Vec::new();

        for key in rule.recipient_keys {
            for id in context.get_ids(key) {
                if seen.insert(id) {
                    recipients.push(id);
                }
            }
        }

        if !rule.roles.is_empty() {
            for user in self.store.list_active_users_by_roles(rule.roles).await? {
                if seen.insert(user.id) {
                    recipients.push(user.id);
                }
            }
        }

        Ok(recipients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::presence::{ChannelHandle, PresenceRegistry};
    use crate::store::mock::MockEntityStore;
    use crate::store::models::Role;
    use crate::test_helpers::user_with_role;

    async fn dispatcher_with(store: MockEntityStore) -> NotificationDispatcher {
        let store: Arc<dyn EntityStore> = Arc::new(store);
        let delivery = Arc::new(DeliverySubsystem::new(
            store.clone(),
            Arc::new(PresenceRegistry::new()),
        ));
        NotificationDispatcher::new(store, delivery)
    }

    #[tokio::test]
    async fn test_specific_recipient_gets_exactly_one_row() {
        let assignee = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let dispatcher = dispatcher_with(MockEntityStore::new()).await;

        let ctx = EventContext::new(task_id)
            .with_id("assignee_id", assignee)
            .with("task_title", "Wire up login");
        dispatcher.fire(EventKind::TaskAssigned, ctx).await;

        let rows = dispatcher.store.list_notifications(assignee, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "task_assigned");
        assert_eq!(rows[0].ref_id, task_id);
        assert!(rows[0].message.contains("Wire up login"));
    }

    #[tokio::test]
    async fn test_role_broadcast_reaches_active_users_only() {
        let pm = user_with_role(Role::ProjectManager);
        let mut inactive_pm = user_with_role(Role::ProjectManager);
        inactive_pm.active = false;
        let developer = user_with_role(Role::Developer);

        let store = MockEntityStore::new()
            .with_user(pm.clone())
            .await
            .with_user(inactive_pm.clone())
            .await
            .with_user(developer.clone())
            .await;
        let dispatcher = dispatcher_with(store).await;

        let ctx = EventContext::new(Uuid::new_v4()).with("task_title", "T");
        dispatcher.fire(EventKind::TaskCreated, ctx).await;

        assert_eq!(
            dispatcher.store.list_notifications(pm.id, 10).await.unwrap().len(),
            1
        );
        assert!(dispatcher
            .store
            .list_notifications(inactive_pm.id, 10)
            .await
            .unwrap()
            .is_empty());
        assert!(dispatcher
            .store
            .list_notifications(developer.id, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_user_qualifying_twice_gets_one_row() {
        // A PM who is also the explicit assignee must receive a single row
        let pm = user_with_role(Role::ProjectManager);
        let store = MockEntityStore::new().with_user(pm.clone()).await;
        let dispatcher = dispatcher_with(store).await;

        let ctx = EventContext::new(Uuid::new_v4())
            .with_ids("assignee_ids", &[pm.id])
            .with("task_title", "T");
        dispatcher.fire(EventKind::TaskCompleted, ctx).await;

        let rows = dispatcher.store.list_notifications(pm.id, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_is_duplicate_free_across_runs() {
        let pm = user_with_role(Role::ProjectManager);
        let store = MockEntityStore::new().with_user(pm.clone()).await;
        let dispatcher = dispatcher_with(store).await;

        let ctx = EventContext::new(Uuid::new_v4()).with_ids("assignee_ids", &[pm.id]);
        for _ in 0..2 {
            let recipients = dispatcher
                .resolve_recipients(EventKind::TaskCompleted, &ctx)
                .await
                .unwrap();
            let unique: HashSet<_> = recipients.iter().collect();
            assert_eq!(unique.len(), recipients.len());
        }
    }

    #[tokio::test]
    async fn test_unknown_event_string_is_noop() {
        let dispatcher = dispatcher_with(MockEntityStore::new()).await;
        let ctx = EventContext::new(Uuid::new_v4());
        // Must not panic or create rows
        dispatcher.fire_raw("definitely_not_an_event", ctx).await;
        assert!(dispatcher
            .store
            .list_notifications(Uuid::new_v4(), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_known_event_string_dispatches() {
        let assignee = Uuid::new_v4();
        let dispatcher = dispatcher_with(MockEntityStore::new()).await;

        let ctx = EventContext::new(Uuid::new_v4()).with_id("assignee_id", assignee);
        dispatcher.fire_raw("task_assigned", ctx).await;

        assert_eq!(
            dispatcher
                .store
                .list_notifications(assignee, 10)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_present_recipient_receives_push_on_fire() {
        let assignee = Uuid::new_v4();
        let dispatcher = dispatcher_with(MockEntityStore::new()).await;

        let (handle, mut rx) = ChannelHandle::new();
        dispatcher.delivery.presence().register(assignee, handle);

        let ctx = EventContext::new(Uuid::new_v4())
            .with_id("assignee_id", assignee)
            .with("task_title", "T");
        dispatcher.fire(EventKind::TaskAssigned, ctx).await;

        let pushed = rx.try_recv().unwrap();
        assert_eq!(pushed.recipient, assignee);
        assert!(pushed.delivered_at.is_none(), "push carries the pre-claim row");
    }
}
