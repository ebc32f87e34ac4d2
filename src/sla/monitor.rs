//! SLA monitor
//!
//! Periodic read-then-fire sweeps over the active entity set: deadline
//! warnings/breaches, task inactivity, budget thresholds, and defect
//! density. Sweeps write no entity state; they only re-enter the
//! notification dispatcher. Every check is isolated: one failing predicate
//! never takes down the rest of the cycle or the next one.

use crate::notify::{EventContext, EventKind, NotificationDispatcher};
use crate::store::models::*;
use crate::store::EntityStore;
use anyhow::Result;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Thresholds and cadence for the SLA sweeps
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    /// Fire a deadline warning this many days before the end date
    pub deadline_warning_days: i64,
    /// Tasks in progress/review untouched for this long are flagged
    pub inactivity_hours: i64,
    /// Budget usage percentage that triggers a warning
    pub budget_warning_pct: f64,
    /// Budget usage percentage that triggers a critical alert
    pub budget_critical_pct: f64,
    /// Module defect density percentage that triggers an alert
    pub defect_density_pct: f64,
    /// Hourly-class sweep cadence (deadlines, budget, density)
    pub deadline_interval_secs: u64,
    /// Higher-frequency sweep cadence (inactivity)
    pub inactivity_interval_secs: u64,
    /// Upper bound on one sweep's run time; an overrunning sweep is cut
    /// short and the cycle skips to its next scheduled run
    pub sweep_timeout_secs: u64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            deadline_warning_days: 3,
            inactivity_hours: 48,
            budget_warning_pct: 80.0,
            budget_critical_pct: 95.0,
            defect_density_pct: 25.0,
            deadline_interval_secs: 3600,
            inactivity_interval_secs: 900,
            sweep_timeout_secs: 60,
        }
    }
}

/// Periodic scanner synthesizing notification events from time-based
/// predicates
pub struct SlaMonitor {
    store: Arc<dyn EntityStore>,
    dispatcher: Arc<NotificationDispatcher>,
    config: SlaConfig,
    stop_tx: Option<mpsc::Sender<()>>,
}

impl SlaMonitor {
    pub fn new(
        store: Arc<dyn EntityStore>,
        dispatcher: Arc<NotificationDispatcher>,
        config: SlaConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
            stop_tx: None,
        }
    }

    /// Spawn the two timer loops. Each tick runs its sweep under a timeout;
    /// missed ticks are skipped, never replayed in a burst.
    pub fn start(&mut self) {
        if self.stop_tx.is_some() {
            return; // already running
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        self.stop_tx = Some(stop_tx);

        let hourly = Arc::new(SweepContext {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
        });
        let frequent = hourly.clone();
        let timeout = std::time::Duration::from_secs(self.config.sweep_timeout_secs);
        let deadline_period = std::time::Duration::from_secs(self.config.deadline_interval_secs);
        let inactivity_period =
            std::time::Duration::from_secs(self.config.inactivity_interval_secs);

        tokio::spawn(async move {
            let mut deadline_tick = tokio::time::interval(deadline_period);
            deadline_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut inactivity_tick = tokio::time::interval(inactivity_period);
            inactivity_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("SLA monitor stopping");
                        break;
                    }
                    _ = deadline_tick.tick() => {
                        if tokio::time::timeout(timeout, hourly.run_hourly_sweep())
                            .await
                            .is_err()
                        {
                            warn!("hourly SLA sweep exceeded its time bound, skipping to next run");
                        }
                    }
                    _ = inactivity_tick.tick() => {
                        if tokio::time::timeout(timeout, frequent.run_inactivity_sweep())
                            .await
                            .is_err()
                        {
                            warn!("inactivity sweep exceeded its time bound, skipping to next run");
                        }
                    }
                }
            }
        });

        tracing::info!(
            deadline_secs = self.config.deadline_interval_secs,
            inactivity_secs = self.config.inactivity_interval_secs,
            "SLA monitor started"
        );
    }

    /// Stop the timer loops
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Run one hourly-class sweep immediately (deadlines, budget, density)
    pub async fn run_hourly_sweep(&self) {
        SweepContext {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
        }
        .run_hourly_sweep()
        .await;
    }

    /// Run one inactivity sweep immediately
    pub async fn run_inactivity_sweep(&self) {
        SweepContext {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
        }
        .run_inactivity_sweep()
        .await;
    }
}

/// Shared state for one sweep execution
struct SweepContext {
    store: Arc<dyn EntityStore>,
    dispatcher: Arc<NotificationDispatcher>,
    config: SlaConfig,
}

impl SweepContext {
    async fn run_hourly_sweep(&self) {
        debug!("running hourly SLA sweep");
        // Each check isolated: a throwing predicate must not starve the rest
        if let Err(e) = self.check_project_deadlines().await {
            warn!("project deadline check failed: {e:#}");
        }
        if let Err(e) = self.check_module_deadlines().await {
            warn!("module deadline check failed: {e:#}");
        }
        if let Err(e) = self.check_sprint_deadlines().await {
            warn!("sprint deadline check failed: {e:#}");
        }
        if let Err(e) = self.check_budgets().await {
            warn!("budget check failed: {e:#}");
        }
        if let Err(e) = self.check_defect_density().await {
            warn!("defect density check failed: {e:#}");
        }
    }

    async fn run_inactivity_sweep(&self) {
        debug!("running inactivity sweep");
        if let Err(e) = self.check_stale_tasks().await {
            warn!("task inactivity check failed: {e:#}");
        }
    }

    /// Days until an end date: negative when past due
    fn days_left(&self, end: chrono::DateTime<Utc>) -> i64 {
        (end - Utc::now()).num_days()
    }

    async fn check_project_deadlines(&self) -> Result<()> {
        for project in self.store.list_open_projects().await? {
            let Some(end) = project.end_date else { continue };
            let ctx = EventContext::new(project.id).with("project_name", project.name.clone());
            if end < Utc::now() {
                self.dispatcher.fire(EventKind::ProjectOverdue, ctx).await;
            } else {
                let days = self.days_left(end);
                if days <= self.config.deadline_warning_days {
                    self.dispatcher
                        .fire(
                            EventKind::ProjectDeadlineApproaching,
                            ctx.with("days_left", days),
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn check_module_deadlines(&self) -> Result<()> {
        for module in self.store.list_open_modules().await? {
            let Some(end) = module.end_date else { continue };
            let ctx = EventContext::new(module.id).with("module_name", module.name.clone());
            if end < Utc::now() {
                self.dispatcher.fire(EventKind::ModuleOverdue, ctx).await;
            } else {
                let days = self.days_left(end);
                if days <= self.config.deadline_warning_days {
                    self.dispatcher
                        .fire(
                            EventKind::ModuleDeadlineApproaching,
                            ctx.with("days_left", days),
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn check_sprint_deadlines(&self) -> Result<()> {
        for sprint in self.store.list_open_sprints().await? {
            let Some(end) = sprint.end_date else { continue };
            let ctx = EventContext::new(sprint.id)
                .with("sprint_name", sprint.name.clone())
                .with_ids("member_ids", &sprint.members);
            if end < Utc::now() {
                self.dispatcher.fire(EventKind::SprintOverdue, ctx).await;
            } else {
                let days = self.days_left(end);
                if days <= self.config.deadline_warning_days {
                    self.dispatcher
                        .fire(
                            EventKind::SprintDeadlineApproaching,
                            ctx.with("days_left", days),
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn check_budgets(&self) -> Result<()> {
        for project in self.store.list_open_projects().await? {
            let Some(total) = project.budget_total else { continue };
            if total <= 0.0 {
                continue;
            }
            let percent_used = project.budget_spent / total * 100.0;
            let ctx = EventContext::new(project.id)
                .with("project_name", project.name.clone())
                .with("percent_used", percent_used);

            if percent_used >= self.config.budget_critical_pct {
                self.dispatcher
                    .fire(EventKind::ProjectBudgetCritical, ctx)
                    .await;
            } else if percent_used >= self.config.budget_warning_pct {
                self.dispatcher
                    .fire(EventKind::ProjectBudgetWarning, ctx)
                    .await;
            }
        }
        Ok(())
    }

    async fn check_defect_density(&self) -> Result<()> {
        for module in self.store.list_open_modules().await? {
            if module.counters.total_tasks == 0 {
                continue;
            }
            if module.counters.defect_density >= self.config.defect_density_pct {
                let ctx = EventContext::new(module.id)
                    .with("module_name", module.name.clone())
                    .with("defect_density", module.counters.defect_density);
                self.dispatcher
                    .fire(EventKind::ModuleDefectDensityHigh, ctx)
                    .await;
            }
        }
        Ok(())
    }

    async fn check_stale_tasks(&self) -> Result<()> {
        let cutoff = Utc::now() - Duration::hours(self.config.inactivity_hours);
        let watched = [TaskStatus::InProgress, TaskStatus::InReview, TaskStatus::QaTest];

        for task in self.store.list_stale_tasks(&watched, cutoff).await? {
            let idle_hours = (Utc::now() - task.updated_at).num_hours();
            let ctx = EventContext::new(task.id)
                .with("task_title", task.title.clone())
                .with("idle_hours", idle_hours)
                .with_ids("assignee_ids", &task.assignees)
                .with_ids("reviewer_ids", &task.reviewers);

            let kind = match task.status {
                TaskStatus::InReview => EventKind::TaskReviewStalled,
                TaskStatus::QaTest => EventKind::TaskQaStalled,
                _ => EventKind::TaskInactive,
            };
            self.dispatcher.fire(kind, ctx).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{DeliverySubsystem, PresenceRegistry};
    use crate::store::mock::MockEntityStore;
    use crate::test_helpers::{task_in_sprint, user_with_role};
    use crate::workflow::models::CreateProjectRequest;
    use uuid::Uuid;

    fn monitor_over(store: MockEntityStore, config: SlaConfig) -> (SlaMonitor, Arc<dyn EntityStore>) {
        let store: Arc<dyn EntityStore> = Arc::new(store);
        let delivery = Arc::new(DeliverySubsystem::new(
            store.clone(),
            Arc::new(PresenceRegistry::new()),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), delivery));
        (
            SlaMonitor::new(store.clone(), dispatcher, config),
            store,
        )
    }

    fn project_due(end_offset_days: i64) -> ProjectNode {
        let mut project = ProjectNode::new(CreateProjectRequest {
            name: "Portal".into(),
            description: None,
            budget_total: None,
            start_date: None,
            end_date: None,
        });
        project.end_date = Some(Utc::now() + Duration::days(end_offset_days));
        project
    }

    #[tokio::test]
    async fn test_overdue_project_fires_to_pm() {
        let pm = user_with_role(Role::ProjectManager);
        let store = MockEntityStore::new()
            .with_user(pm.clone())
            .await
            .with_project(project_due(-1))
            .await;
        let (monitor, store) = monitor_over(store, SlaConfig::default());

        monitor.run_hourly_sweep().await;

        let rows = store.list_notifications(pm.id, 50).await.unwrap();
        assert!(rows.iter().any(|n| n.kind == "project_overdue"));
    }

    #[tokio::test]
    async fn test_deadline_warning_inside_window_only() {
        let pm = user_with_role(Role::ProjectManager);
        let far = project_due(30);
        let near = project_due(2);
        let store = MockEntityStore::new()
            .with_user(pm.clone())
            .await
            .with_project(far.clone())
            .await
            .with_project(near.clone())
            .await;
        let (monitor, store) = monitor_over(store, SlaConfig::default());

        monitor.run_hourly_sweep().await;

        let rows = store.list_notifications(pm.id, 50).await.unwrap();
        let warnings: Vec<_> = rows
            .iter()
            .filter(|n| n.kind == "project_deadline_approaching")
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].ref_id, near.id);
    }

    #[tokio::test]
    async fn test_completed_projects_are_skipped() {
        let pm = user_with_role(Role::ProjectManager);
        let mut done = project_due(-5);
        done.status = ProjectStatus::Completed;
        let store = MockEntityStore::new()
            .with_user(pm.clone())
            .await
            .with_project(done)
            .await;
        let (monitor, store) = monitor_over(store, SlaConfig::default());

        monitor.run_hourly_sweep().await;

        assert!(store.list_notifications(pm.id, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_budget_thresholds() {
        let pm = user_with_role(Role::ProjectManager);

        let mut warn = project_due(30);
        warn.end_date = None;
        warn.budget_total = Some(1000.0);
        warn.budget_spent = 850.0;

        let mut critical = project_due(30);
        critical.end_date = None;
        critical.budget_total = Some(1000.0);
        critical.budget_spent = 990.0;

        let mut fine = project_due(30);
        fine.end_date = None;
        fine.budget_total = Some(1000.0);
        fine.budget_spent = 100.0;

        let store = MockEntityStore::new()
            .with_user(pm.clone())
            .await
            .with_project(warn.clone())
            .await
            .with_project(critical.clone())
            .await
            .with_project(fine)
            .await;
        let (monitor, store) = monitor_over(store, SlaConfig::default());

        monitor.run_hourly_sweep().await;

        let rows = store.list_notifications(pm.id, 50).await.unwrap();
        let warnings: Vec<_> = rows
            .iter()
            .filter(|n| n.kind == "project_budget_warning")
            .collect();
        let criticals: Vec<_> = rows
            .iter()
            .filter(|n| n.kind == "project_budget_critical")
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].ref_id, warn.id);
        assert_eq!(criticals.len(), 1);
        assert_eq!(criticals[0].ref_id, critical.id);
    }

    #[tokio::test]
    async fn test_inactivity_sweep_flags_stale_tasks_by_state() {
        let scrum_master = user_with_role(Role::ScrumMaster);
        let assignee = Uuid::new_v4();

        let mut stale_progress = task_in_sprint(Uuid::new_v4(), TaskStatus::InProgress);
        stale_progress.updated_at = Utc::now() - Duration::hours(72);
        stale_progress.assignees = vec![assignee];

        let mut stale_review = task_in_sprint(Uuid::new_v4(), TaskStatus::InReview);
        stale_review.updated_at = Utc::now() - Duration::hours(72);

        let fresh = task_in_sprint(Uuid::new_v4(), TaskStatus::InProgress);

        let store = MockEntityStore::new()
            .with_user(scrum_master.clone())
            .await
            .with_task(stale_progress.clone())
            .await
            .with_task(stale_review.clone())
            .await
            .with_task(fresh)
            .await;
        let (monitor, store) = monitor_over(store, SlaConfig::default());

        monitor.run_inactivity_sweep().await;

        let rows = store.list_notifications(scrum_master.id, 50).await.unwrap();
        assert!(rows
            .iter()
            .any(|n| n.kind == "task_inactive" && n.ref_id == stale_progress.id));
        assert!(rows
            .iter()
            .any(|n| n.kind == "task_review_stalled" && n.ref_id == stale_review.id));
        assert_eq!(rows.len(), 2, "fresh tasks must not fire");

        // The stale assignee got their specific copy
        let assignee_rows = store.list_notifications(assignee, 50).await.unwrap();
        assert_eq!(assignee_rows.len(), 1);
        assert!(assignee_rows[0].message.contains("no activity"));
    }

    #[tokio::test]
    async fn test_sweeps_write_no_entity_state() {
        let pm = user_with_role(Role::ProjectManager);
        let project = project_due(-1);
        let store = MockEntityStore::new()
            .with_user(pm)
            .await
            .with_project(project.clone())
            .await;
        let (monitor, store) = monitor_over(store, SlaConfig::default());

        monitor.run_hourly_sweep().await;

        let stored = store.get_project(project.id).await.unwrap().unwrap();
        assert_eq!(stored.status, project.status);
        assert_eq!(stored.updated_at, project.updated_at);
    }
}
