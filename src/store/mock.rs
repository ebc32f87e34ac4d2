//! In-memory mock implementation of EntityStore for testing.
//!
//! Backed by `tokio::sync::RwLock<HashMap<K, V>>` collections. The
//! notification CAS runs under the write lock, so it is atomic the same way
//! the backend's conditional update is.

use crate::store::models::*;
use crate::store::traits::EntityStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory mock implementation of EntityStore for testing.
pub struct MockEntityStore {
    pub users: RwLock<HashMap<Uuid, UserNode>>,
    pub projects: RwLock<HashMap<Uuid, ProjectNode>>,
    pub modules: RwLock<HashMap<Uuid, ModuleNode>>,
    pub sprints: RwLock<HashMap<Uuid, SprintNode>>,
    pub tasks: RwLock<HashMap<Uuid, TaskNode>>,
    pub notifications: RwLock<HashMap<Uuid, NotificationNode>>,
}

impl MockEntityStore {
    /// Create a new empty MockEntityStore.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            projects: RwLock::new(HashMap::new()),
            modules: RwLock::new(HashMap::new()),
            sprints: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            notifications: RwLock::new(HashMap::new()),
        }
    }

    // ========================================================================
    // Builder / seeding methods for tests
    // ========================================================================

    /// Seed a user into the store.
    pub async fn with_user(self, user: UserNode) -> Self {
        self.users.write().await.insert(user.id, user);
        self
    }

    /// Seed a project into the store.
    pub async fn with_project(self, project: ProjectNode) -> Self {
        self.projects.write().await.insert(project.id, project);
        self
    }

    /// Seed a module into the store.
    pub async fn with_module(self, module: ModuleNode) -> Self {
        self.modules.write().await.insert(module.id, module);
        self
    }

    /// Seed a sprint into the store.
    pub async fn with_sprint(self, sprint: SprintNode) -> Self {
        self.sprints.write().await.insert(sprint.id, sprint);
        self
    }

    /// Seed a task into the store.
    pub async fn with_task(self, task: TaskNode) -> Self {
        self.tasks.write().await.insert(task.id, task);
        self
    }

    /// Seed a notification into the store.
    pub async fn with_notification(self, notification: NotificationNode) -> Self {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification);
        self
    }
}

impl Default for MockEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MockEntityStore {
    // ========================================================================
    // User operations
    // ========================================================================

    async fn create_user(&self, user: &UserNode) -> Result<()> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserNode>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list_active_users_by_roles(&self, roles: &[Role]) -> Result<Vec<UserNode>> {
        let users = self.users.read().await;
        let mut matched: Vec<UserNode> = users
            .values()
            .filter(|u| u.active && roles.contains(&u.role))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    // ========================================================================
    // Project operations
    // ========================================================================

    async fn create_project(&self, project: &ProjectNode) -> Result<()> {
        self.projects
            .write()
            .await
            .insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<ProjectNode>> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn update_project_status(&self, id: Uuid, status: ProjectStatus) -> Result<()> {
        if let Some(project) = self.projects.write().await.get_mut(&id) {
            project.status = status;
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_project_rollup(&self, id: Uuid, counters: &RollupCounters) -> Result<()> {
        if let Some(project) = self.projects.write().await.get_mut(&id) {
            project.counters = *counters;
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_open_projects(&self) -> Result<Vec<ProjectNode>> {
        Ok(self
            .projects
            .read()
            .await
            .values()
            .filter(|p| p.status != ProjectStatus::Completed)
            .cloned()
            .collect())
    }

    // ========================================================================
    // Module operations
    // ========================================================================

    async fn create_module(&self, module: &ModuleNode) -> Result<()> {
        self.modules.write().await.insert(module.id, module.clone());
        Ok(())
    }

    async fn get_module(&self, id: Uuid) -> Result<Option<ModuleNode>> {
        Ok(self.modules.read().await.get(&id).cloned())
    }

    async fn list_project_modules(&self, project_id: Uuid) -> Result<Vec<ModuleNode>> {
        let mut modules: Vec<ModuleNode> = self
            .modules
            .read()
            .await
            .values()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.created_at);
        Ok(modules)
    }

    async fn update_module_status(
        &self,
        id: Uuid,
        status: ModuleStatus,
        entry: &HistoryEntry,
    ) -> Result<()> {
        if let Some(module) = self.modules.write().await.get_mut(&id) {
            module.status = status;
            module.updated_at = Utc::now();
            module.history.push(entry.clone());
        }
        Ok(())
    }

    async fn update_module_rollup(
        &self,
        id: Uuid,
        progress: u32,
        counters: &RollupCounters,
    ) -> Result<()> {
        if let Some(module) = self.modules.write().await.get_mut(&id) {
            module.progress = progress;
            module.counters = *counters;
            module.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_open_modules(&self) -> Result<Vec<ModuleNode>> {
        Ok(self
            .modules
            .read()
            .await
            .values()
            .filter(|m| !m.status.is_terminal())
            .cloned()
            .collect())
    }

    // ========================================================================
    // Sprint operations
    // ========================================================================

    async fn create_sprint(&self, sprint: &SprintNode) -> Result<()> {
        self.sprints.write().await.insert(sprint.id, sprint.clone());
        Ok(())
    }

    async fn get_sprint(&self, id: Uuid) -> Result<Option<SprintNode>> {
        Ok(self.sprints.read().await.get(&id).cloned())
    }

    async fn list_module_sprints(&self, module_id: Uuid) -> Result<Vec<SprintNode>> {
        let mut sprints: Vec<SprintNode> = self
            .sprints
            .read()
            .await
            .values()
            .filter(|s| s.module_id == Some(module_id))
            .cloned()
            .collect();
        sprints.sort_by_key(|s| s.created_at);
        Ok(sprints)
    }

    async fn update_sprint_status(&self, id: Uuid, status: SprintStatus) -> Result<()> {
        if let Some(sprint) = self.sprints.write().await.get_mut(&id) {
            sprint.status = status;
        }
        Ok(())
    }

    async fn list_open_sprints(&self) -> Result<Vec<SprintNode>> {
        Ok(self
            .sprints
            .read()
            .await
            .values()
            .filter(|s| s.status != SprintStatus::Done)
            .cloned()
            .collect())
    }

    // ========================================================================
    // Task operations
    // ========================================================================

    async fn create_task(&self, task: &TaskNode) -> Result<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<TaskNode>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn save_task(&self, task: &TaskNode) -> Result<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn list_sprint_tasks(&self, sprint_id: Uuid) -> Result<Vec<TaskNode>> {
        let mut tasks: Vec<TaskNode> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.sprint_id == sprint_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn list_stale_tasks(
        &self,
        statuses: &[TaskStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<TaskNode>> {
        let mut tasks: Vec<TaskNode> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| statuses.contains(&t.status) && t.updated_at < older_than)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.updated_at);
        Ok(tasks)
    }

    // ========================================================================
    // Notification operations
    // ========================================================================

    async fn insert_notification(&self, notification: &NotificationNode) -> Result<()> {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<NotificationNode>> {
        Ok(self.notifications.read().await.get(&id).cloned())
    }

    async fn claim_notification_delivered(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        // Check-and-set under the write lock, mirroring the backend's
        // conditional update
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(&id) {
            Some(n) if n.delivered_at.is_none() => {
                n.delivered_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_pending_notifications(&self, recipient: Uuid) -> Result<Vec<NotificationNode>> {
        let mut pending: Vec<NotificationNode> = self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| n.recipient == recipient && !n.is_read && n.delivered_at.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|n| n.created_at);
        Ok(pending)
    }

    async fn list_notifications(
        &self,
        recipient: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationNode>> {
        let mut rows: Vec<NotificationNode> = self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn mark_notifications_read(
        &self,
        recipient: Uuid,
        ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut notifications = self.notifications.write().await;
        let mut updated = 0;
        for id in ids {
            if let Some(n) = notifications.get_mut(id) {
                if n.recipient == recipient && !n.is_read {
                    n.is_read = true;
                    n.read_at = Some(at);
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{notification_for, user_with_role};

    #[tokio::test]
    async fn test_claim_is_exactly_once() {
        let store = MockEntityStore::new();
        let n = notification_for(Uuid::new_v4());
        store.insert_notification(&n).await.unwrap();

        assert!(store
            .claim_notification_delivered(n.id, Utc::now())
            .await
            .unwrap());
        assert!(!store
            .claim_notification_delivered(n.id, Utc::now())
            .await
            .unwrap());

        let stored = store.get_notification(n.id).await.unwrap().unwrap();
        assert!(stored.delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_claim_missing_row_is_false() {
        let store = MockEntityStore::new();
        assert!(!store
            .claim_notification_delivered(Uuid::new_v4(), Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_pending_ordered_oldest_first() {
        let recipient = Uuid::new_v4();
        let mut first = notification_for(recipient);
        first.created_at = Utc::now() - chrono::Duration::minutes(10);
        let second = notification_for(recipient);

        let store = MockEntityStore::new()
            .with_notification(second.clone())
            .await
            .with_notification(first.clone())
            .await;

        let pending = store.list_pending_notifications(recipient).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
    }

    #[tokio::test]
    async fn test_mark_read_scoped_to_recipient() {
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let theirs = notification_for(user_b);

        let store = MockEntityStore::new()
            .with_notification(theirs.clone())
            .await;

        let updated = store
            .mark_notifications_read(user_a, &[theirs.id], Utc::now())
            .await
            .unwrap();
        assert_eq!(updated, 0);

        let row = store.get_notification(theirs.id).await.unwrap().unwrap();
        assert!(!row.is_read);
        assert!(row.read_at.is_none());
    }

    #[tokio::test]
    async fn test_role_query_skips_inactive() {
        let mut inactive = user_with_role(Role::ProjectManager);
        inactive.active = false;
        let active = user_with_role(Role::ProjectManager);

        let store = MockEntityStore::new()
            .with_user(inactive)
            .await
            .with_user(active.clone())
            .await;

        let users = store
            .list_active_users_by_roles(&[Role::ProjectManager])
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, active.id);
    }
}
