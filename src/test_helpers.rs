//! Test helper factories and mock state builders
//!
//! Convenience functions for creating test objects with sensible defaults,
//! and helpers wiring a WorkflowManager over the in-memory mock store.
#![allow(dead_code)]

use crate::notify::{DeliverySubsystem, NotificationDispatcher, PresenceRegistry};
use crate::store::mock::MockEntityStore;
use crate::store::models::*;
use crate::store::EntityStore;
use crate::workflow::{StatusAggregator, WorkflowManager};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Entity factories
// ============================================================================

/// Create an active user with the given role
pub fn user_with_role(role: Role) -> UserNode {
    let id = Uuid::new_v4();
    UserNode {
        id,
        name: format!("user-{}", &id.to_string()[..8]),
        email: format!("{}@example.com", &id.to_string()[..8]),
        role,
        active: true,
        created_at: Utc::now(),
    }
}

/// Create a task in the given sprint and status, not yet reviewed
pub fn task_in_sprint(sprint_id: Uuid, status: TaskStatus) -> TaskNode {
    let now = Utc::now();
    TaskNode {
        id: Uuid::new_v4(),
        sprint_id,
        title: "test task".into(),
        description: None,
        status,
        review_status: ReviewStatus::NotReviewed,
        assignees: vec![],
        reviewers: vec![],
        story_points: 0,
        created_at: now,
        updated_at: now,
        history: vec![],
    }
}

/// Create an unread, undelivered notification for a recipient
pub fn notification_for(recipient: Uuid) -> NotificationNode {
    NotificationNode::new(
        recipient,
        "task_assigned",
        Uuid::new_v4(),
        "test notification".into(),
    )
}

// ============================================================================
// Engine builders
// ============================================================================

/// Wire a full workflow engine over a seeded mock store. Returns the manager
/// plus the store handle for assertions.
pub fn workflow_over(store: MockEntityStore) -> (WorkflowManager, Arc<dyn EntityStore>) {
    let store: Arc<dyn EntityStore> = Arc::new(store);
    let presence = Arc::new(PresenceRegistry::new());
    let delivery = Arc::new(DeliverySubsystem::new(store.clone(), presence));
    let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), delivery));
    let aggregator = Arc::new(StatusAggregator::new(store.clone(), dispatcher.clone()));
    let manager = WorkflowManager::new(store.clone(), aggregator, dispatcher);
    (manager, store)
}
