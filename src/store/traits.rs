//! EntityStore trait definition
//!
//! Abstract interface over the durable store. Mirrors the public async
//! methods of `Neo4jStore`, enabling testing with the in-memory mock and
//! future backend swaps. The core never assumes more than equality/range
//! filters and a CAS-style conditional update.

use crate::store::models::*;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Abstract interface for all entity persistence operations.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Create a user
    async fn create_user(&self, user: &UserNode) -> Result<()>;

    /// Get a user by ID
    async fn get_user(&self, id: Uuid) -> Result<Option<UserNode>>;

    /// All active users whose role is in the given set
    async fn list_active_users_by_roles(&self, roles: &[Role]) -> Result<Vec<UserNode>>;

    // ========================================================================
    // Project operations
    // ========================================================================

    /// Create a project
    async fn create_project(&self, project: &ProjectNode) -> Result<()>;

    /// Get a project by ID
    async fn get_project(&self, id: Uuid) -> Result<Option<ProjectNode>>;

    /// Update a project's derived status
    async fn update_project_status(&self, id: Uuid, status: ProjectStatus) -> Result<()>;

    /// Update a project's rollup counters
    async fn update_project_rollup(&self, id: Uuid, counters: &RollupCounters) -> Result<()>;

    /// Projects not yet completed (deadline / budget sweeps)
    async fn list_open_projects(&self) -> Result<Vec<ProjectNode>>;

    // ========================================================================
    // Module operations
    // ========================================================================

    /// Create a module
    async fn create_module(&self, module: &ModuleNode) -> Result<()>;

    /// Get a module by ID
    async fn get_module(&self, id: Uuid) -> Result<Option<ModuleNode>>;

    /// List all modules of a project
    async fn list_project_modules(&self, project_id: Uuid) -> Result<Vec<ModuleNode>>;

    /// Update a module's status and append a history entry
    async fn update_module_status(
        &self,
        id: Uuid,
        status: ModuleStatus,
        entry: &HistoryEntry,
    ) -> Result<()>;

    /// Update a module's derived progress/counters (never its status)
    async fn update_module_rollup(
        &self,
        id: Uuid,
        progress: u32,
        counters: &RollupCounters,
    ) -> Result<()>;

    /// Modules not yet in a terminal status (deadline sweep)
    async fn list_open_modules(&self) -> Result<Vec<ModuleNode>>;

    // ========================================================================
    // Sprint operations
    // ========================================================================

    /// Create a sprint
    async fn create_sprint(&self, sprint: &SprintNode) -> Result<()>;

    /// Get a sprint by ID
    async fn get_sprint(&self, id: Uuid) -> Result<Option<SprintNode>>;

    /// List all sprints attached to a module
    async fn list_module_sprints(&self, module_id: Uuid) -> Result<Vec<SprintNode>>;

    /// Update a sprint's derived status
    async fn update_sprint_status(&self, id: Uuid, status: SprintStatus) -> Result<()>;

    /// Sprints not yet done (deadline sweep)
    async fn list_open_sprints(&self) -> Result<Vec<SprintNode>>;

    // ========================================================================
    // Task operations
    // ========================================================================

    /// Create a task
    async fn create_task(&self, task: &TaskNode) -> Result<()>;

    /// Get a task by ID
    async fn get_task(&self, id: Uuid) -> Result<Option<TaskNode>>;

    /// Persist a full task (status, review status, membership, history)
    async fn save_task(&self, task: &TaskNode) -> Result<()>;

    /// List all tasks of a sprint
    async fn list_sprint_tasks(&self, sprint_id: Uuid) -> Result<Vec<TaskNode>>;

    /// Tasks in any of the given statuses whose `updated_at` is older than
    /// the cutoff (inactivity sweep)
    async fn list_stale_tasks(
        &self,
        statuses: &[TaskStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<TaskNode>>;

    // ========================================================================
    // Notification operations
    // ========================================================================

    /// Persist one notification row
    async fn insert_notification(&self, notification: &NotificationNode) -> Result<()>;

    /// Get a notification by ID
    async fn get_notification(&self, id: Uuid) -> Result<Option<NotificationNode>>;

    /// CAS claim: set `delivered_at` iff currently null. Returns true when
    /// this call won the claim.
    async fn claim_notification_delivered(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Undelivered, unread notifications for a recipient, oldest first
    async fn list_pending_notifications(&self, recipient: Uuid) -> Result<Vec<NotificationNode>>;

    /// Recent notifications for a recipient, newest first
    async fn list_notifications(
        &self,
        recipient: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationNode>>;

    /// Mark as read exactly the rows among `ids` owned by `recipient`.
    /// Foreign ids are ignored. Returns the number of rows updated.
    async fn mark_notifications_read(
        &self,
        recipient: Uuid,
        ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<usize>;
}
