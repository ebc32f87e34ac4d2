//! Workflow operations
//!
//! The business operations that drive the engine. Each one validates at the
//! edge, commits the primary write, then lets the advisory machinery run:
//! event firing and upward propagation can degrade but never fail a request
//! that already committed.

use super::aggregator::StatusAggregator;
use super::models::*;
use super::transitions::{
    review_actor_allowed, task_actor_allowed, validate_module_transition, TransitionError,
};
use crate::notify::{EventContext, EventKind, NotificationDispatcher};
use crate::store::models::*;
use crate::store::EntityStore;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Failure of a workflow operation
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Invalid transition or actor not permitted. The only category the
    /// caller ever sees as a request failure with state untouched
    #[error(transparent)]
    Validation(#[from] TransitionError),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

type Result<T> = std::result::Result<T, WorkflowError>;

/// Manager for workflow operations
pub struct WorkflowManager {
    store: Arc<dyn EntityStore>,
    aggregator: Arc<StatusAggregator>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl WorkflowManager {
    pub fn new(
        store: Arc<dyn EntityStore>,
        aggregator: Arc<StatusAggregator>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            aggregator,
            dispatcher,
        }
    }

    async fn actor(&self, id: Uuid) -> Result<UserNode> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("user {id}")))
    }

    // ========================================================================
    // Project / module / sprint creation
    // ========================================================================

    /// Create a project
    pub async fn create_project(&self, req: CreateProjectRequest) -> Result<ProjectNode> {
        let project = ProjectNode::new(req);
        self.store.create_project(&project).await?;

        let ctx = EventContext::new(project.id).with("project_name", project.name.clone());
        self.dispatcher.fire(EventKind::ProjectCreated, ctx).await;

        Ok(project)
    }

    /// Create a module in the Proposed state
    pub async fn create_module(&self, req: CreateModuleRequest) -> Result<ModuleNode> {
        if self.store.get_project(req.project_id).await?.is_none() {
            return Err(WorkflowError::NotFound(format!(
                "project {}",
                req.project_id
            )));
        }

        let module = ModuleNode::new(req);
        self.store.create_module(&module).await?;

        let ctx = EventContext::new(module.id).with("module_name", module.name.clone());
        self.dispatcher.fire(EventKind::ModuleCreated, ctx).await;

        Ok(module)
    }

    /// Create a sprint, optionally attached to a module
    pub async fn create_sprint(&self, req: CreateSprintRequest) -> Result<SprintNode> {
        if let Some(module_id) = req.module_id {
            if self.store.get_module(module_id).await?.is_none() {
                return Err(WorkflowError::NotFound(format!("module {module_id}")));
            }
        }

        let sprint = SprintNode::new(req);
        self.store.create_sprint(&sprint).await?;

        let ctx = EventContext::new(sprint.id)
            .with("sprint_name", sprint.name.clone())
            .with_ids("member_ids", &sprint.members);
        self.dispatcher.fire(EventKind::SprintCreated, ctx).await;

        Ok(sprint)
    }

    // ========================================================================
    // Task operations
    // ========================================================================

    /// Create a task and walk the derivation chain (a new task flips an
    /// empty sprint to InProgress)
    pub async fn create_task(&self, req: CreateTaskRequest, actor_id: Uuid) -> Result<TaskNode> {
        let actor = self.actor(actor_id).await?;
        let sprint = self
            .store
            .get_sprint(req.sprint_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("sprint {}", req.sprint_id)))?;

        let mut task = TaskNode::new(req);
        task.record("created", actor.id, format!("created in sprint {}", sprint.name));
        self.store.create_task(&task).await?;

        let ctx = self
            .task_ctx(&task)
            .with("actor_name", actor.name.clone());
        self.dispatcher.fire(EventKind::TaskCreated, ctx).await;

        if !task.assignees.is_empty() {
            let ctx = self
                .task_ctx(&task)
                .with_ids("assignee_id", &task.assignees);
            self.dispatcher.fire(EventKind::TaskAssigned, ctx).await;
        }

        self.aggregator.propagate_task_change(task.sprint_id).await;

        Ok(task)
    }

    /// Add an assignee to a task
    pub async fn assign_task(&self, task_id: Uuid, req: AssignTaskRequest) -> Result<TaskNode> {
        let actor = self.actor(req.actor_id).await?;
        let mut task = self.get_task(task_id).await?;

        if !task.assignees.contains(&req.assignee_id) {
            task.assignees.push(req.assignee_id);
            task.record("assigned", actor.id, format!("assignee {}", req.assignee_id));
            self.store.save_task(&task).await?;

            let ctx = self
                .task_ctx(&task)
                .with_id("assignee_id", req.assignee_id)
                .with("actor_name", actor.name.clone());
            self.dispatcher.fire(EventKind::TaskAssigned, ctx).await;
        }

        Ok(task)
    }

    /// Change a task's status. Role/ownership validation happens before any
    /// write; the status write commits before events fire and the walk runs.
    pub async fn update_task_status(
        &self,
        task_id: Uuid,
        req: UpdateTaskStatusRequest,
    ) -> Result<TaskNode> {
        let actor = self.actor(req.actor_id).await?;
        let mut task = self.get_task(task_id).await?;

        task_actor_allowed(&task, &actor)?;

        let old = task.status;
        if old == req.status {
            return Ok(task);
        }

        task.status = req.status;
        task.record(
            "status_changed",
            actor.id,
            format!("{:?} -> {:?}", old, req.status),
        );
        self.store.save_task(&task).await?;

        let ctx = self
            .task_ctx(&task)
            .with("actor_name", actor.name.clone())
            .with_ids("assignee_ids", &task.assignees)
            .with_ids("reviewer_ids", &task.reviewers);
        self.dispatcher
            .fire(task_status_event(old, req.status), ctx)
            .await;

        self.aggregator.propagate_task_change(task.sprint_id).await;

        Ok(task)
    }

    /// Record a review verdict on a task
    pub async fn review_task(&self, task_id: Uuid, req: ReviewTaskRequest) -> Result<TaskNode> {
        let actor = self.actor(req.actor_id).await?;
        let mut task = self.get_task(task_id).await?;

        review_actor_allowed(&task, &actor)?;

        task.review_status = req.verdict;
        task.record(
            "reviewed",
            actor.id,
            format!("verdict {:?}", req.verdict),
        );
        self.store.save_task(&task).await?;

        let kind = match req.verdict {
            ReviewStatus::Passed => EventKind::TaskReviewPassed,
            ReviewStatus::Failed => EventKind::TaskReviewFailed,
            ReviewStatus::NotReviewed => EventKind::TaskReviewRequested,
        };
        let ctx = self
            .task_ctx(&task)
            .with("actor_name", actor.name.clone())
            .with("reason", req.reason.unwrap_or_default())
            .with_ids("assignee_ids", &task.assignees)
            .with_ids("reviewer_ids", &task.reviewers);
        self.dispatcher.fire(kind, ctx).await;

        self.aggregator.propagate_task_change(task.sprint_id).await;

        Ok(task)
    }

    /// Hand a task over to a new assignee (and optionally a new reviewer)
    pub async fn handover_task(&self, task_id: Uuid, req: HandoverTaskRequest) -> Result<TaskNode> {
        let actor = self.actor(req.actor_id).await?;
        let mut task = self.get_task(task_id).await?;

        task_actor_allowed(&task, &actor)?;

        let old_assignees = std::mem::replace(&mut task.assignees, vec![req.new_assignee_id]);
        if let Some(reviewer) = req.new_reviewer_id {
            task.reviewers = vec![reviewer];
        }
        task.record(
            "handover",
            actor.id,
            format!("assignee -> {}", req.new_assignee_id),
        );
        self.store.save_task(&task).await?;

        let project_manager = self
            .store
            .list_active_users_by_roles(&[Role::ProjectManager])
            .await
            .unwrap_or_default()
            .into_iter()
            .next();

        let mut ctx = self
            .task_ctx(&task)
            .with("actor_name", actor.name.clone())
            .with_id("new_assignee_id", req.new_assignee_id)
            .with_ids("old_assignee_id", &old_assignees);
        if let Some(reviewer) = req.new_reviewer_id {
            ctx = ctx.with_id("new_reviewer_id", reviewer);
        }
        if let Some(pm) = project_manager {
            ctx = ctx.with_id("project_manager_id", pm.id);
        }
        self.dispatcher
            .fire(EventKind::TaskHandoverInitiated, ctx)
            .await;

        Ok(task)
    }

    // ========================================================================
    // Module transitions
    // ========================================================================

    /// Role-gated module status transition. Rejected transitions mutate
    /// nothing and write no history.
    pub async fn transition_module(
        &self,
        module_id: Uuid,
        req: ModuleTransitionRequest,
    ) -> Result<ModuleNode> {
        let actor = self.actor(req.actor_id).await?;
        let module = self
            .store
            .get_module(module_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("module {module_id}")))?;

        validate_module_transition(module.status, req.target, actor.role)?;

        let entry = HistoryEntry {
            action: "status_changed".to_string(),
            actor: actor.id,
            timestamp: Utc::now(),
            description: format!("{:?} -> {:?}", module.status, req.target),
        };
        self.store
            .update_module_status(module_id, req.target, &entry)
            .await?;

        let ctx = EventContext::new(module_id)
            .with("module_name", module.name.clone())
            .with("actor_name", actor.name.clone());
        self.dispatcher
            .fire(module_status_event(req.target), ctx)
            .await;

        // Module status feeds the project derivation; staleness here is
        // advisory, the transition itself already committed
        if let Err(e) = self.aggregator.recompute_project(module.project_id).await {
            tracing::warn!(project = %module.project_id, "project recomputation failed: {e:#}");
        }

        self.store
            .get_module(module_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("module {module_id}")))
    }

    async fn get_task(&self, task_id: Uuid) -> Result<TaskNode> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("task {task_id}")))
    }

    fn task_ctx(&self, task: &TaskNode) -> EventContext {
        EventContext::new(task.id).with("task_title", task.title.clone())
    }
}

/// Event fired when a task enters the given status
fn task_status_event(old: TaskStatus, new: TaskStatus) -> EventKind {
    if old.is_terminal() && !new.is_terminal() && !new.is_bug_flow() {
        return EventKind::TaskReopened;
    }
    match new {
        TaskStatus::Queue => EventKind::TaskQueued,
        TaskStatus::NotStarted => EventKind::TaskDequeued,
        TaskStatus::InProgress => EventKind::TaskStarted,
        TaskStatus::InReview => EventKind::TaskSubmittedForReview,
        TaskStatus::QaTest => EventKind::TaskSentToQa,
        TaskStatus::ReadyForRelease => EventKind::TaskReadyForRelease,
        TaskStatus::Done => EventKind::TaskCompleted,
        TaskStatus::New => EventKind::BugReported,
        TaskStatus::Confirming => EventKind::BugConfirmed,
        TaskStatus::Fixing => {
            if old == TaskStatus::Retesting {
                EventKind::BugReopened
            } else {
                EventKind::BugFixStarted
            }
        }
        TaskStatus::Retesting => EventKind::BugReadyForRetest,
        TaskStatus::Closed => EventKind::BugClosed,
    }
}

/// Event fired when a module enters the given status
fn module_status_event(target: ModuleStatus) -> EventKind {
    match target {
        ModuleStatus::Proposed => EventKind::ModuleCreated,
        ModuleStatus::Approved => EventKind::ModuleApproved,
        ModuleStatus::Active => EventKind::ModuleActivated,
        ModuleStatus::ReadyForRelease => EventKind::ModuleReadyForRelease,
        ModuleStatus::Released => EventKind::ModuleReleased,
        ModuleStatus::Maintained => EventKind::ModuleMaintained,
        ModuleStatus::Archived => EventKind::ModuleArchived,
    }
}
