//! Status aggregator
//!
//! Pure derivation functions for sprint/project status and module rollups,
//! plus the synchronous propagation walk that runs them bottom-up after every
//! task write. Each recomputation step that changes a value fires one event
//! with the old and new value in context. A failing step is logged and
//! swallowed: derived-state staleness is preferred over failing the write
//! that triggered the walk.

use crate::notify::{EventContext, EventKind, NotificationDispatcher};
use crate::store::models::*;
use crate::store::EntityStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

// ============================================================================
// Pure derivations
// ============================================================================

/// Derive a sprint's status from its task set.
///
/// NotStarted iff the set is empty; Done iff every task passed review;
/// InProgress otherwise. Pure and idempotent.
pub fn derive_sprint_status(tasks: &[TaskNode]) -> SprintStatus {
    if tasks.is_empty() {
        SprintStatus::NotStarted
    } else if tasks.iter().all(|t| t.review_status == ReviewStatus::Passed) {
        SprintStatus::Done
    } else {
        SprintStatus::InProgress
    }
}

/// Derive a project's status from its modules' statuses.
///
/// Initializing when there are no modules or none has left the proposal
/// states; Completed iff every module is terminal; InProgress otherwise.
pub fn derive_project_status(statuses: &[ModuleStatus]) -> ProjectStatus {
    if statuses.is_empty() {
        ProjectStatus::Initializing
    } else if statuses.iter().all(|s| s.is_terminal()) {
        ProjectStatus::Completed
    } else if statuses.iter().any(|s| s.is_underway()) {
        ProjectStatus::InProgress
    } else {
        ProjectStatus::Initializing
    }
}

/// Recompute rollup counters and progress from a task set.
///
/// A task counts as completed once it passed review. Progress prefers story
/// points and falls back to task counts when nothing is estimated.
pub fn compute_rollup(tasks: &[TaskNode]) -> (u32, RollupCounters) {
    let total_tasks = tasks.len() as u32;
    let completed_tasks = tasks
        .iter()
        .filter(|t| t.review_status == ReviewStatus::Passed)
        .count() as u32;
    let total_story_points: u32 = tasks.iter().map(|t| t.story_points).sum();
    let completed_story_points: u32 = tasks
        .iter()
        .filter(|t| t.review_status == ReviewStatus::Passed)
        .map(|t| t.story_points)
        .sum();
    let bug_tasks = tasks.iter().filter(|t| t.status.is_bug_flow()).count() as u32;

    let defect_density = if total_tasks == 0 {
        0.0
    } else {
        (f64::from(bug_tasks) / f64::from(total_tasks) * 1000.0).round() / 10.0
    };

    let progress = if total_story_points > 0 {
        (completed_story_points * 100) / total_story_points
    } else if total_tasks > 0 {
        (completed_tasks * 100) / total_tasks
    } else {
        0
    };

    (
        progress,
        RollupCounters {
            total_tasks,
            completed_tasks,
            total_story_points,
            completed_story_points,
            defect_density,
        },
    )
}

/// Snake_case wire name of a status enum, for event contexts
fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

fn sprint_change_event(old: SprintStatus, new: SprintStatus) -> EventKind {
    match (old, new) {
        (SprintStatus::Done, SprintStatus::InProgress) => EventKind::SprintReopened,
        (_, SprintStatus::Done) => EventKind::SprintCompleted,
        (SprintStatus::NotStarted, SprintStatus::InProgress) => EventKind::SprintStarted,
        _ => EventKind::SprintUpdated,
    }
}

fn project_change_event(old: ProjectStatus, new: ProjectStatus) -> EventKind {
    match (old, new) {
        (ProjectStatus::Completed, ProjectStatus::InProgress) => EventKind::ProjectReopened,
        (_, ProjectStatus::Completed) => EventKind::ProjectCompleted,
        (ProjectStatus::Initializing, ProjectStatus::InProgress) => EventKind::ProjectStarted,
        _ => EventKind::ProjectUpdated,
    }
}

// ============================================================================
// Propagation walk
// ============================================================================

/// Runs the upward derivation chain Task → Sprint → Module → Project
pub struct StatusAggregator {
    store: Arc<dyn EntityStore>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl StatusAggregator {
    pub fn new(store: Arc<dyn EntityStore>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Walk upward from a task's sprint to the project root.
    ///
    /// Synchronous and exhaustive: sprint before module before project,
    /// inline with the triggering request. Never returns an error: every
    /// step failure is logged and the walk continues where it can.
    pub async fn propagate_task_change(&self, sprint_id: Uuid) {
        let module_id = match self.recompute_sprint(sprint_id).await {
            Ok(module_id) => module_id,
            Err(e) => {
                warn!(sprint = %sprint_id, "sprint recomputation failed: {e:#}");
                // Without the sprint we cannot find the module; stop here
                return;
            }
        };

        let Some(module_id) = module_id else {
            return; // unattached sprint
        };

        let project_id = match self.recompute_module_rollup(module_id).await {
            Ok(project_id) => Some(project_id),
            Err(e) => {
                warn!(module = %module_id, "module rollup recomputation failed: {e:#}");
                None
            }
        };

        if let Some(project_id) = project_id {
            if let Err(e) = self.recompute_project(project_id).await {
                warn!(project = %project_id, "project recomputation failed: {e:#}");
            }
        }
    }

    /// Recompute a sprint's derived status; fires one event when it changes.
    /// Returns the sprint's parent module id for the next step.
    async fn recompute_sprint(&self, sprint_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        let sprint = self
            .store
            .get_sprint(sprint_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("sprint {sprint_id} not found"))?;

        let tasks = self.store.list_sprint_tasks(sprint_id).await?;
        let derived = derive_sprint_status(&tasks);

        if derived != sprint.status {
            self.store.update_sprint_status(sprint_id, derived).await?;

            let ctx = EventContext::new(sprint_id)
                .with("sprint_name", sprint.name.clone())
                .with("old_status", wire_name(&sprint.status))
                .with("new_status", wire_name(&derived))
                .with_ids("member_ids", &sprint.members);
            self.dispatcher
                .fire(sprint_change_event(sprint.status, derived), ctx)
                .await;
        }

        Ok(sprint.module_id)
    }

    /// Rescan every task under all of a module's sprints and update its
    /// progress/counters (never its role-driven status enum). Fires one
    /// progress event when anything changed. Returns the parent project id.
    async fn recompute_module_rollup(&self, module_id: Uuid) -> anyhow::Result<Uuid> {
        let module = self
            .store
            .get_module(module_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("module {module_id} not found"))?;

        let mut tasks = Vec::new();
        for sprint in self.store.list_module_sprints(module_id).await? {
            tasks.extend(self.store.list_sprint_tasks(sprint.id).await?);
        }

        let (progress, counters) = compute_rollup(&tasks);

        if progress != module.progress || counters != module.counters {
            self.store
                .update_module_rollup(module_id, progress, &counters)
                .await?;

            let ctx = EventContext::new(module_id)
                .with("module_name", module.name.clone())
                .with("progress", i64::from(progress))
                .with("old_progress", i64::from(module.progress));
            self.dispatcher
                .fire(EventKind::ModuleProgressUpdated, ctx)
                .await;
        }

        Ok(module.project_id)
    }

    /// Recompute a project's derived status and rollup from its modules.
    /// Also called directly after a role-gated module transition.
    pub async fn recompute_project(&self, project_id: Uuid) -> anyhow::Result<()> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("project {project_id} not found"))?;

        let modules = self.store.list_project_modules(project_id).await?;
        let statuses: Vec<ModuleStatus> = modules.iter().map(|m| m.status).collect();
        let derived = derive_project_status(&statuses);

        let counters = sum_counters(&modules);
        if counters != project.counters {
            self.store
                .update_project_rollup(project_id, &counters)
                .await?;
        }

        if derived != project.status {
            self.store
                .update_project_status(project_id, derived)
                .await?;

            let ctx = EventContext::new(project_id)
                .with("project_name", project.name.clone())
                .with("old_status", wire_name(&project.status))
                .with("new_status", wire_name(&derived));
            self.dispatcher
                .fire(project_change_event(project.status, derived), ctx)
                .await;
        }

        Ok(())
    }
}

/// Mirror the module counters up to the project level
fn sum_counters(modules: &[ModuleNode]) -> RollupCounters {
    let mut total = RollupCounters::default();
    for module in modules {
        total.total_tasks += module.counters.total_tasks;
        total.completed_tasks += module.counters.completed_tasks;
        total.total_story_points += module.counters.total_story_points;
        total.completed_story_points += module.counters.completed_story_points;
    }
    if total.total_tasks > 0 {
        let weighted: f64 = modules
            .iter()
            .map(|m| m.counters.defect_density * f64::from(m.counters.total_tasks))
            .sum();
        total.defect_density = (weighted / f64::from(total.total_tasks) * 10.0).round() / 10.0;
    }
    total
}
