//! Event kinds and the flat event context passed to the dispatcher

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// A business event worth notifying about.
///
/// The canonical wire form is the snake_case string returned by
/// [`EventKind::as_str`]; inbound producers address events by that string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // ── Task lifecycle ─────────────────────────────────────────────────
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskAssigned,
    TaskUnassigned,
    TaskReviewerAssigned,
    TaskReviewerRemoved,
    TaskQueued,
    TaskDequeued,
    TaskStarted,
    TaskSubmittedForReview,
    TaskSentToQa,
    TaskReadyForRelease,
    TaskCompleted,
    TaskReopened,
    TaskStoryPointsChanged,
    TaskCommentAdded,
    // ── Review flow ────────────────────────────────────────────────────
    TaskReviewRequested,
    TaskReviewPassed,
    TaskReviewFailed,
    // ── Handover flow ──────────────────────────────────────────────────
    TaskHandoverInitiated,
    TaskHandoverAccepted,
    TaskHandoverRejected,
    TaskHandoverCompleted,
    // ── Bug sub-flow ───────────────────────────────────────────────────
    BugReported,
    BugConfirmed,
    BugFixStarted,
    BugReadyForRetest,
    BugReopened,
    BugClosed,
    // ── QA flow ────────────────────────────────────────────────────────
    QaTestStarted,
    QaTestPassed,
    QaTestFailed,
    // ── Sprint ─────────────────────────────────────────────────────────
    SprintCreated,
    SprintUpdated,
    SprintDeleted,
    SprintStarted,
    SprintCompleted,
    SprintReopened,
    SprintMemberAdded,
    SprintMemberRemoved,
    SprintTaskAdded,
    SprintTaskRemoved,
    SprintAttachedToModule,
    SprintDetachedFromModule,
    SprintDeadlineApproaching,
    SprintOverdue,
    // ── Module ─────────────────────────────────────────────────────────
    ModuleCreated,
    ModuleUpdated,
    ModuleDeleted,
    ModuleApproved,
    ModuleActivated,
    ModuleReadyForRelease,
    ModuleReleased,
    ModuleMaintained,
    ModuleArchived,
    ModuleProgressUpdated,
    ModuleDeadlineApproaching,
    ModuleOverdue,
    ModuleDefectDensityHigh,
    ModuleDeploymentStarted,
    ModuleDeploymentCompleted,
    ModuleDeploymentFailed,
    // ── Project ────────────────────────────────────────────────────────
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    ProjectStarted,
    ProjectCompleted,
    ProjectReopened,
    ProjectManagerAssigned,
    ProjectMemberAdded,
    ProjectMemberRemoved,
    ProjectDeadlineApproaching,
    ProjectOverdue,
    ProjectBudgetUpdated,
    ProjectBudgetWarning,
    ProjectBudgetCritical,
    // ── SLA-synthesized ────────────────────────────────────────────────
    TaskInactive,
    TaskReviewStalled,
    TaskQaStalled,
}

impl EventKind {
    /// Every known event kind, in declaration order
    pub const ALL: &'static [EventKind] = &[
        EventKind::TaskCreated,
        EventKind::TaskUpdated,
        EventKind::TaskDeleted,
        EventKind::TaskAssigned,
        EventKind::TaskUnassigned,
        EventKind::TaskReviewerAssigned,
        EventKind::TaskReviewerRemoved,
        EventKind::TaskQueued,
        EventKind::TaskDequeued,
        EventKind::TaskStarted,
        EventKind::TaskSubmittedForReview,
        EventKind::TaskSentToQa,
        EventKind::TaskReadyForRelease,
        EventKind::TaskCompleted,
        EventKind::TaskReopened,
        EventKind::TaskStoryPointsChanged,
        EventKind::TaskCommentAdded,
        EventKind::TaskReviewRequested,
        EventKind::TaskReviewPassed,
        EventKind::TaskReviewFailed,
        EventKind::TaskHandoverInitiated,
        EventKind::TaskHandoverAccepted,
        EventKind::TaskHandoverRejected,
        EventKind::TaskHandoverCompleted,
        EventKind::BugReported,
        EventKind::BugConfirmed,
        EventKind::BugFixStarted,
        EventKind::BugReadyForRetest,
        EventKind::BugReopened,
        EventKind::BugClosed,
        EventKind::QaTestStarted,
        EventKind::QaTestPassed,
        EventKind::QaTestFailed,
        EventKind::SprintCreated,
        EventKind::SprintUpdated,
        EventKind::SprintDeleted,
        EventKind::SprintStarted,
        EventKind::SprintCompleted,
        EventKind::SprintReopened,
        EventKind::SprintMemberAdded,
        EventKind::SprintMemberRemoved,
        EventKind::SprintTaskAdded,
        EventKind::SprintTaskRemoved,
        EventKind::SprintAttachedToModule,
        EventKind::SprintDetachedFromModule,
        EventKind::SprintDeadlineApproaching,
        EventKind::SprintOverdue,
        EventKind::ModuleCreated,
        EventKind::ModuleUpdated,
        EventKind::ModuleDeleted,
        EventKind::ModuleApproved,
        EventKind::ModuleActivated,
        EventKind::ModuleReadyForRelease,
        EventKind::ModuleReleased,
        EventKind::ModuleMaintained,
        EventKind::ModuleArchived,
        EventKind::ModuleProgressUpdated,
        EventKind::ModuleDeadlineApproaching,
        EventKind::ModuleOverdue,
        EventKind::ModuleDefectDensityHigh,
        EventKind::ModuleDeploymentStarted,
        EventKind::ModuleDeploymentCompleted,
        EventKind::ModuleDeploymentFailed,
        EventKind::ProjectCreated,
        EventKind::ProjectUpdated,
        EventKind::ProjectDeleted,
        EventKind::ProjectStarted,
        EventKind::ProjectCompleted,
        EventKind::ProjectReopened,
        EventKind::ProjectManagerAssigned,
        EventKind::ProjectMemberAdded,
        EventKind::ProjectMemberRemoved,
        EventKind::ProjectDeadlineApproaching,
        EventKind::ProjectOverdue,
        EventKind::ProjectBudgetUpdated,
        EventKind::ProjectBudgetWarning,
        EventKind::ProjectBudgetCritical,
        EventKind::TaskInactive,
        EventKind::TaskReviewStalled,
        EventKind::TaskQaStalled,
    ];

    /// Canonical snake_case string form
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskCreated => "task_created",
            EventKind::TaskUpdated => "task_updated",
            EventKind::TaskDeleted => "task_deleted",
            EventKind::TaskAssigned => "task_assigned",
            EventKind::TaskUnassigned => "task_unassigned",
            EventKind::TaskReviewerAssigned => "task_reviewer_assigned",
            EventKind::TaskReviewerRemoved => "task_reviewer_removed",
            EventKind::TaskQueued => "task_queued",
            EventKind::TaskDequeued => "task_dequeued",
            EventKind::TaskStarted => "task_started",
            EventKind::TaskSubmittedForReview => "task_submitted_for_review",
            EventKind::TaskSentToQa => "task_sent_to_qa",
            EventKind::TaskReadyForRelease => "task_ready_for_release",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskReopened => "task_reopened",
            EventKind::TaskStoryPointsChanged => "task_story_points_changed",
            EventKind::TaskCommentAdded => "task_comment_added",
            EventKind::TaskReviewRequested => "task_review_requested",
            EventKind::TaskReviewPassed => "task_review_passed",
            EventKind::TaskReviewFailed => "task_review_failed",
            EventKind::TaskHandoverInitiated => "task_handover_initiated",
            EventKind::TaskHandoverAccepted => "task_handover_accepted",
            EventKind::TaskHandoverRejected => "task_handover_rejected",
            EventKind::TaskHandoverCompleted => "task_handover_completed",
            EventKind::BugReported => "bug_reported",
            EventKind::BugConfirmed => "bug_confirmed",
            EventKind::BugFixStarted => "bug_fix_started",
            EventKind::BugReadyForRetest => "bug_ready_for_retest",
            EventKind::BugReopened => "bug_reopened",
            EventKind::BugClosed => "bug_closed",
            EventKind::QaTestStarted => "qa_test_started",
            EventKind::QaTestPassed => "qa_test_passed",
            EventKind::QaTestFailed => "qa_test_failed",
            EventKind::SprintCreated => "sprint_created",
            EventKind::SprintUpdated => "sprint_updated",
            EventKind::SprintDeleted => "sprint_deleted",
            EventKind::SprintStarted => "sprint_started",
            EventKind::SprintCompleted => "sprint_completed",
            EventKind::SprintReopened => "sprint_reopened",
            EventKind::SprintMemberAdded => "sprint_member_added",
            EventKind::SprintMemberRemoved => "sprint_member_removed",
            EventKind::SprintTaskAdded => "sprint_task_added",
            EventKind::SprintTaskRemoved => "sprint_task_removed",
            EventKind::SprintAttachedToModule => "sprint_attached_to_module",
            EventKind::SprintDetachedFromModule => "sprint_detached_from_module",
            EventKind::SprintDeadlineApproaching => "sprint_deadline_approaching",
            EventKind::SprintOverdue => "sprint_overdue",
            EventKind::ModuleCreated => "module_created",
            EventKind::ModuleUpdated => "module_updated",
            EventKind::ModuleDeleted => "module_deleted",
            EventKind::ModuleApproved => "module_approved",
            EventKind::ModuleActivated => "module_activated",
            EventKind::ModuleReadyForRelease => "module_ready_for_release",
            EventKind::ModuleReleased => "module_released",
            EventKind::ModuleMaintained => "module_maintained",
            EventKind::ModuleArchived => "module_archived",
            EventKind::ModuleProgressUpdated => "module_progress_updated",
            EventKind::ModuleDeadlineApproaching => "module_deadline_approaching",
            EventKind::ModuleOverdue => "module_overdue",
            EventKind::ModuleDefectDensityHigh => "module_defect_density_high",
            EventKind::ModuleDeploymentStarted => "module_deployment_started",
            EventKind::ModuleDeploymentCompleted => "module_deployment_completed",
            EventKind::ModuleDeploymentFailed => "module_deployment_failed",
            EventKind::ProjectCreated => "project_created",
            EventKind::ProjectUpdated => "project_updated",
            EventKind::ProjectDeleted => "project_deleted",
            EventKind::ProjectStarted => "project_started",
            EventKind::ProjectCompleted => "project_completed",
            EventKind::ProjectReopened => "project_reopened",
            EventKind::ProjectManagerAssigned => "project_manager_assigned",
            EventKind::ProjectMemberAdded => "project_member_added",
            EventKind::ProjectMemberRemoved => "project_member_removed",
            EventKind::ProjectDeadlineApproaching => "project_deadline_approaching",
            EventKind::ProjectOverdue => "project_overdue",
            EventKind::ProjectBudgetUpdated => "project_budget_updated",
            EventKind::ProjectBudgetWarning => "project_budget_warning",
            EventKind::ProjectBudgetCritical => "project_budget_critical",
            EventKind::TaskInactive => "task_inactive",
            EventKind::TaskReviewStalled => "task_review_stalled",
            EventKind::TaskQaStalled => "task_qa_stalled",
        }
    }

    /// Parse the canonical string form. Returns None for unknown strings;
    /// the dispatcher turns those into a logged no-op, never an error.
    pub fn parse(s: &str) -> Option<EventKind> {
        EventKind::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat map of named values accompanying a fired event.
///
/// Carries the id of the entity the event is about (`ref_id`) plus whatever
/// the event type documents: display names, old/new statuses, and the
/// specific-recipient ids the rule table extracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventContext {
    /// The entity the event is about
    pub ref_id: Uuid,
    #[serde(default, flatten)]
    pub values: HashMap<String, Value>,
}

impl EventContext {
    /// Create a context for the given entity
    pub fn new(ref_id: Uuid) -> Self {
        Self {
            ref_id,
            values: HashMap::new(),
        }
    }

    /// Set a named value
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Set a named user/entity id
    pub fn with_id(self, key: &str, id: Uuid) -> Self {
        self.with(key, id.to_string())
    }

    /// Set a named list of user/entity ids
    pub fn with_ids(mut self, key: &str, ids: &[Uuid]) -> Self {
        self.values.insert(
            key.to_string(),
            Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect()),
        );
        self
    }

    /// String value for a key, if present
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// String value for a key, or a fallback for rendering
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    /// Integer value for a key
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_i64())
    }

    /// Float value for a key
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(|v| v.as_f64())
    }

    /// Ids stored under a key. Accepts a single id string or an array of id
    /// strings; unparseable entries are skipped.
    pub fn get_ids(&self, key: &str) -> Vec<Uuid> {
        match self.values.get(key) {
            Some(Value::String(s)) => s.parse().into_iter().collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| s.parse().ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}
