//! `EntityStore` implementation for `Neo4jClient`.
//!
//! Every method simply delegates to the corresponding inherent method on `Neo4jClient`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::client::Neo4jClient;
use super::models::*;
use super::traits::EntityStore;

#[async_trait]
impl EntityStore for Neo4jClient {
    // ========================================================================
    // User operations
    // ========================================================================

    async fn create_user(&self, user: &UserNode) -> anyhow::Result<()> {
        self.create_user(user).await
    }

    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<UserNode>> {
        self.get_user(id).await
    }

    async fn list_active_users_by_roles(&self, roles: &[Role]) -> anyhow::Result<Vec<UserNode>> {
        self.list_active_users_by_roles(roles).await
    }

    // ========================================================================
    // Project operations
    // ========================================================================

    async fn create_project(&self, project: &ProjectNode) -> anyhow::Result<()> {
        self.create_project(project).await
    }

    async fn get_project(&self, id: Uuid) -> anyhow::Result<Option<ProjectNode>> {
        self.get_project(id).await
    }

    async fn update_project_status(&self, id: Uuid, status: ProjectStatus) -> anyhow::Result<()> {
        self.update_project_status(id, status).await
    }

    async fn update_project_rollup(
        &self,
        id: Uuid,
        counters: &RollupCounters,
    ) -> anyhow::Result<()> {
        self.update_project_rollup(id, counters).await
    }

    async fn list_open_projects(&self) -> anyhow::Result<Vec<ProjectNode>> {
        self.list_open_projects().await
    }

    // ========================================================================
    // Module operations
    // ========================================================================

    async fn create_module(&self, module: &ModuleNode) -> anyhow::Result<()> {
        self.create_module(module).await
    }

    async fn get_module(&self, id: Uuid) -> anyhow::Result<Option<ModuleNode>> {
        self.get_module(id).await
    }

    async fn list_project_modules(&self, project_id: Uuid) -> anyhow::Result<Vec<ModuleNode>> {
        self.list_project_modules(project_id).await
    }

    async fn update_module_status(
        &self,
        id: Uuid,
        status: ModuleStatus,
        entry: &HistoryEntry,
    ) -> anyhow::Result<()> {
        self.update_module_status(id, status, entry).await
    }

    async fn update_module_rollup(
        &self,
        id: Uuid,
        progress: u32,
        counters: &RollupCounters,
    ) -> anyhow::Result<()> {
        self.update_module_rollup(id, progress, counters).await
    }

    async fn list_open_modules(&self) -> anyhow::Result<Vec<ModuleNode>> {
        self.list_open_modules().await
    }

    // ========================================================================
    // Sprint operations
    // ========================================================================

    async fn create_sprint(&self, sprint: &SprintNode) -> anyhow::Result<()> {
        self.create_sprint(sprint).await
    }

    async fn get_sprint(&self, id: Uuid) -> anyhow::Result<Option<SprintNode>> {
        self.get_sprint(id).await
    }

    async fn list_module_sprints(&self, module_id: Uuid) -> anyhow::Result<Vec<SprintNode>> {
        self.list_module_sprints(module_id).await
    }

    async fn update_sprint_status(&self, id: Uuid, status: SprintStatus) -> anyhow::Result<()> {
        self.update_sprint_status(id, status).await
    }

    async fn list_open_sprints(&self) -> anyhow::Result<Vec<SprintNode>> {
        self.list_open_sprints().await
    }

    // ========================================================================
    // Task operations
    // ========================================================================

    async fn create_task(&self, task: &TaskNode) -> anyhow::Result<()> {
        self.create_task(task).await
    }

    async fn get_task(&self, id: Uuid) -> anyhow::Result<Option<TaskNode>> {
        self.get_task(id).await
    }

    async fn save_task(&self, task: &TaskNode) -> anyhow::Result<()> {
        self.save_task(task).await
    }

    async fn list_sprint_tasks(&self, sprint_id: Uuid) -> anyhow::Result<Vec<TaskNode>> {
        self.list_sprint_tasks(sprint_id).await
    }

    async fn list_stale_tasks(
        &self,
        statuses: &[TaskStatus],
        older_than: DateTime<Utc>,
    ) -> anyhow::Result<Vec<TaskNode>> {
        self.list_stale_tasks(statuses, older_than).await
    }

    // ========================================================================
    // Notification operations
    // ========================================================================

    async fn insert_notification(&self, notification: &NotificationNode) -> anyhow::Result<()> {
        self.insert_notification(notification).await
    }

    async fn get_notification(&self, id: Uuid) -> anyhow::Result<Option<NotificationNode>> {
        self.get_notification(id).await
    }

    async fn claim_notification_delivered(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        self.claim_notification_delivered(id, at).await
    }

    async fn list_pending_notifications(
        &self,
        recipient: Uuid,
    ) -> anyhow::Result<Vec<NotificationNode>> {
        self.list_pending_notifications(recipient).await
    }

    async fn list_notifications(
        &self,
        recipient: Uuid,
        limit: usize,
    ) -> anyhow::Result<Vec<NotificationNode>> {
        self.list_notifications(recipient, limit).await
    }

    async fn mark_notifications_read(
        &self,
        recipient: Uuid,
        ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        self.mark_notifications_read(recipient, ids, at).await
    }
}
