//! Workflow request DTOs and entity constructors

use crate::store::models::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub budget_total: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Request to create a new module under a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateModuleRequest {
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Request to create a new sprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSprintRequest {
    /// Module to attach to; sprints may start unattached
    pub module_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub members: Vec<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Request to create a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub sprint_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub assignees: Vec<Uuid>,
    #[serde(default)]
    pub reviewers: Vec<Uuid>,
    #[serde(default)]
    pub story_points: u32,
}

/// Request to change a task's status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub actor_id: Uuid,
    pub status: TaskStatus,
}

/// Request to add an assignee to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTaskRequest {
    pub actor_id: Uuid,
    pub assignee_id: Uuid,
}

/// Request to record a review verdict on a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewTaskRequest {
    pub actor_id: Uuid,
    pub verdict: ReviewStatus,
    pub reason: Option<String>,
}

/// Request to hand a task over to a new assignee (and optionally reviewer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoverTaskRequest {
    pub actor_id: Uuid,
    pub new_assignee_id: Uuid,
    pub new_reviewer_id: Option<Uuid>,
}

/// Request for a role-gated module status transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleTransitionRequest {
    pub actor_id: Uuid,
    pub target: ModuleStatus,
}

// ============================================================================
// Entity constructors
// ============================================================================

impl UserNode {
    /// Create an active user
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role,
            active: true,
            created_at: Utc::now(),
        }
    }
}

impl ProjectNode {
    /// Create a project in its initial derived status
    pub fn new(req: CreateProjectRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            status: ProjectStatus::Initializing,
            counters: RollupCounters::default(),
            budget_total: req.budget_total,
            budget_spent: 0.0,
            start_date: req.start_date,
            end_date: req.end_date,
            created_at: now,
            updated_at: now,
        }
    }
}

impl ModuleNode {
    /// Create a module in the Proposed state
    pub fn new(req: CreateModuleRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id: req.project_id,
            name: req.name,
            description: req.description,
            status: ModuleStatus::Proposed,
            progress: 0,
            counters: RollupCounters::default(),
            start_date: req.start_date,
            end_date: req.end_date,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }
}

impl SprintNode {
    /// Create an empty sprint; its status is NotStarted by derivation
    pub fn new(req: CreateSprintRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            module_id: req.module_id,
            name: req.name,
            status: SprintStatus::NotStarted,
            members: req.members,
            start_date: req.start_date,
            end_date: req.end_date,
            created_at: Utc::now(),
        }
    }
}

impl TaskNode {
    /// Create a task in the queue, not yet reviewed
    pub fn new(req: CreateTaskRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sprint_id: req.sprint_id,
            title: req.title,
            description: req.description,
            status: TaskStatus::Queue,
            review_status: ReviewStatus::NotReviewed,
            assignees: req.assignees,
            reviewers: req.reviewers,
            story_points: req.story_points,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    /// Append a history entry and bump `updated_at`
    pub fn record(&mut self, action: &str, actor: Uuid, description: impl Into<String>) {
        let now = Utc::now();
        self.history.push(HistoryEntry {
            action: action.to_string(),
            actor,
            timestamp: now,
            description: description.into(),
        });
        self.updated_at = now;
    }
}
