//! Entity models for projects, modules, sprints, tasks, and notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Users & roles
// ============================================================================

/// A workflow role. Role broadcasts and transition gates are expressed
/// against these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    ProjectManager,
    BusinessAnalyst,
    Developer,
    QaTester,
    ScrumMaster,
    DevopsEngineer,
    ProductOwner,
    QualityControl,
    TechLead,
}

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNode {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Inactive users never receive role-broadcast notifications
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Task
// ============================================================================

/// Status of a task. The main flow runs queue → done; the bug sub-flow
/// (new → closed) runs in parallel for defect tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    // Main flow
    Queue,
    NotStarted,
    InProgress,
    InReview,
    QaTest,
    ReadyForRelease,
    Done,
    // Bug sub-flow
    New,
    Confirming,
    Fixing,
    Retesting,
    Closed,
}

impl TaskStatus {
    /// True for statuses belonging to the bug sub-flow
    pub fn is_bug_flow(&self) -> bool {
        matches!(
            self,
            TaskStatus::New
                | TaskStatus::Confirming
                | TaskStatus::Fixing
                | TaskStatus::Retesting
                | TaskStatus::Closed
        )
    }

    /// True for end states of either flow
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Closed)
    }
}

/// Review verdict on a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    NotReviewed,
    Passed,
    Failed,
}

/// One entry in an entity's append-only history log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub actor: Uuid,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// A task within a sprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: Uuid,
    pub sprint_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub review_status: ReviewStatus,
    pub assignees: Vec<Uuid>,
    pub reviewers: Vec<Uuid>,
    pub story_points: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Append-only log of workflow actions on this task
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

// ============================================================================
// Sprint
// ============================================================================

/// Status of a sprint. Derived from its task set, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    NotStarted,
    InProgress,
    Done,
}

/// A sprint, optionally attached to a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintNode {
    pub id: Uuid,
    pub module_id: Option<Uuid>,
    pub name: String,
    pub status: SprintStatus,
    pub members: Vec<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Module
// ============================================================================

/// Status of a module. Transitions follow an explicit graph with role gates;
/// see `workflow::transitions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Proposed,
    Approved,
    Active,
    ReadyForRelease,
    Released,
    Maintained,
    Archived,
}

impl ModuleStatus {
    /// True once a module has left the proposal states
    pub fn is_underway(&self) -> bool {
        !matches!(self, ModuleStatus::Proposed | ModuleStatus::Approved)
    }

    /// Released / Maintained / Archived count as terminal for project
    /// completion purposes
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ModuleStatus::Released | ModuleStatus::Maintained | ModuleStatus::Archived
        )
    }
}

/// Aggregated task counters, recomputed on every propagation walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupCounters {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub total_story_points: u32,
    pub completed_story_points: u32,
    /// Share of tasks that entered the bug sub-flow, as a percentage
    pub defect_density: f64,
}

/// A module within a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleNode {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ModuleStatus,
    /// 0–100, derived from the module's tasks
    pub progress: u32,
    #[serde(flatten)]
    pub counters: RollupCounters,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

// ============================================================================
// Project
// ============================================================================

/// Status of a project. Derived from its module set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Initializing,
    InProgress,
    Completed,
}

/// A project, the root of the entity hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectNode {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    #[serde(flatten)]
    pub counters: RollupCounters,
    pub budget_total: Option<f64>,
    pub budget_spent: f64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Notification
// ============================================================================

/// A notification row. One row per recipient; the persisted shape is also
/// the wire format pushed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationNode {
    pub id: Uuid,
    pub recipient: Uuid,
    /// Canonical snake_case event-type string
    pub kind: String,
    /// The entity this notification is about
    pub ref_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, via CAS, the moment a real-time push succeeds.
    /// Never unset or changed afterwards.
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationNode {
    /// Create an undelivered, unread notification for one recipient
    pub fn new(recipient: Uuid, kind: impl Into<String>, ref_id: Uuid, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            kind: kind.into(),
            ref_id,
            message,
            is_read: false,
            created_at: Utc::now(),
            delivered_at: None,
            read_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::ReadyForRelease).unwrap(),
            "\"ready_for_release\""
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"in_review\"").unwrap(),
            TaskStatus::InReview
        );
    }

    #[test]
    fn test_bug_flow_classification() {
        assert!(TaskStatus::New.is_bug_flow());
        assert!(TaskStatus::Retesting.is_bug_flow());
        assert!(!TaskStatus::InProgress.is_bug_flow());
        assert!(!TaskStatus::Done.is_bug_flow());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Closed.is_terminal());
        assert!(!TaskStatus::QaTest.is_terminal());

        assert!(ModuleStatus::Released.is_terminal());
        assert!(ModuleStatus::Archived.is_terminal());
        assert!(!ModuleStatus::Active.is_terminal());
    }

    #[test]
    fn test_module_underway() {
        assert!(!ModuleStatus::Proposed.is_underway());
        assert!(!ModuleStatus::Approved.is_underway());
        assert!(ModuleStatus::Active.is_underway());
        assert!(ModuleStatus::Maintained.is_underway());
    }

    #[test]
    fn test_role_serde_roundtrip() {
        for role in [
            Role::ProjectManager,
            Role::BusinessAnalyst,
            Role::Developer,
            Role::QaTester,
            Role::ScrumMaster,
            Role::DevopsEngineer,
            Role::ProductOwner,
            Role::QualityControl,
            Role::TechLead,
        ] {
            let json = serde_json::to_string(&role).unwrap();
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(role, back);
        }
        assert_eq!(
            serde_json::to_string(&Role::DevopsEngineer).unwrap(),
            "\"devops_engineer\""
        );
    }

    #[test]
    fn test_notification_new_defaults() {
        let recipient = Uuid::new_v4();
        let ref_id = Uuid::new_v4();
        let n = NotificationNode::new(recipient, "task_assigned", ref_id, "msg".into());
        assert_eq!(n.recipient, recipient);
        assert_eq!(n.ref_id, ref_id);
        assert!(!n.is_read);
        assert!(n.delivered_at.is_none());
        assert!(n.read_at.is_none());
    }

    #[test]
    fn test_notification_wire_shape() {
        let n = NotificationNode::new(Uuid::new_v4(), "task_assigned", Uuid::new_v4(), "m".into());
        let json = serde_json::to_value(&n).unwrap();
        for key in [
            "id",
            "recipient",
            "kind",
            "ref_id",
            "message",
            "is_read",
            "created_at",
            "delivered_at",
            "read_at",
        ] {
            assert!(json.get(key).is_some(), "missing wire field {key}");
        }
    }
}
