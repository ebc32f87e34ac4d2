//! Static notification rule table
//!
//! Maps every event kind to its target roles, the context keys holding
//! specific recipient ids, and a message template. The table is data, not
//! branching logic: the dispatcher only ever looks a rule up and applies it.

use super::types::{EventContext, EventKind};
use crate::store::models::Role;

/// Routing and rendering rule for one event kind
pub struct NotificationRule {
    /// Roles whose active users receive a broadcast copy
    pub roles: &'static [Role],
    /// Context keys holding explicit recipient ids (single id or id array)
    pub recipient_keys: &'static [&'static str],
    /// Message template applied to the event context
    pub render: fn(&EventContext) -> String,
}

impl NotificationRule {
    /// Whether this rule extracts specific recipients from the context
    pub fn uses_specific_recipients(&self) -> bool {
        !self.recipient_keys.is_empty()
    }
}

const fn rule(
    roles: &'static [Role],
    recipient_keys: &'static [&'static str],
    render: fn(&EventContext) -> String,
) -> NotificationRule {
    NotificationRule {
        roles,
        recipient_keys,
        render,
    }
}

use Role::*;

/// Look up the rule for an event kind. Total over `EventKind`: every kind
/// has exactly one rule.
pub fn rule_for(kind: EventKind) -> NotificationRule {
    match kind {
        // ── Task lifecycle ─────────────────────────────────────────────
        EventKind::TaskCreated => rule(&[ProjectManager, ScrumMaster], &[], |c| {
            format!("Task \"{}\" was created", c.str_or("task_title", "untitled"))
        }),
        EventKind::TaskUpdated => rule(&[], &["assignee_ids", "reviewer_ids"], |c| {
            format!(
                "Task \"{}\" was updated by {}",
                c.str_or("task_title", "untitled"),
                c.str_or("actor_name", "someone")
            )
        }),
        EventKind::TaskDeleted => rule(&[ProjectManager], &["assignee_ids"], |c| {
            format!("Task \"{}\" was deleted", c.str_or("task_title", "untitled"))
        }),
        EventKind::TaskAssigned => rule(&[], &["assignee_id"], |c| {
            format!(
                "You were assigned to task \"{}\"",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskUnassigned => rule(&[], &["assignee_id"], |c| {
            format!(
                "You were unassigned from task \"{}\"",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskReviewerAssigned => rule(&[], &["reviewer_id"], |c| {
            format!(
                "You were added as reviewer on task \"{}\"",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskReviewerRemoved => rule(&[], &["reviewer_id"], |c| {
            format!(
                "You were removed as reviewer on task \"{}\"",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskQueued => rule(&[ScrumMaster], &[], |c| {
            format!(
                "Task \"{}\" was moved back to the queue",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskDequeued => rule(&[], &["assignee_ids"], |c| {
            format!(
                "Task \"{}\" was picked from the queue",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskStarted => rule(&[ScrumMaster], &["reviewer_ids"], |c| {
            format!(
                "Work started on task \"{}\"",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskSubmittedForReview => rule(&[], &["reviewer_ids"], |c| {
            format!(
                "Task \"{}\" is waiting for your review",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskSentToQa => rule(&[QaTester], &[], |c| {
            format!(
                "Task \"{}\" is ready for QA testing",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskReadyForRelease => rule(&[DevopsEngineer, ProjectManager], &[], |c| {
            format!(
                "Task \"{}\" is ready for release",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskCompleted => {
            rule(&[ProjectManager, ScrumMaster], &["assignee_ids"], |c| {
                format!("Task \"{}\" is done", c.str_or("task_title", "untitled"))
            })
        }
        EventKind::TaskReopened => rule(&[], &["assignee_ids", "reviewer_ids"], |c| {
            format!(
                "Task \"{}\" was reopened",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskStoryPointsChanged => rule(&[ScrumMaster], &["assignee_ids"], |c| {
            format!(
                "Estimate on task \"{}\" changed to {} points",
                c.str_or("task_title", "untitled"),
                c.get_i64("story_points").unwrap_or(0)
            )
        }),
        EventKind::TaskCommentAdded => rule(&[], &["assignee_ids", "reviewer_ids"], |c| {
            format!(
                "{} commented on task \"{}\"",
                c.str_or("actor_name", "Someone"),
                c.str_or("task_title", "untitled")
            )
        }),

        // ── Review flow ────────────────────────────────────────────────
        EventKind::TaskReviewRequested => rule(&[], &["reviewer_ids"], |c| {
            format!(
                "Review requested on task \"{}\"",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskReviewPassed => rule(&[ProjectManager], &["assignee_ids"], |c| {
            format!(
                "Task \"{}\" passed review",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::TaskReviewFailed => rule(&[], &["assignee_ids"], |c| {
            format!(
                "Task \"{}\" failed review: {}",
                c.str_or("task_title", "untitled"),
                c.str_or("reason", "no reason given")
            )
        }),

        // ── Handover flow ──────────────────────────────────────────────
        EventKind::TaskHandoverInitiated => rule(
            &[],
            &["new_assignee_id", "new_reviewer_id", "project_manager_id"],
            |c| {
                format!(
                    "Handover of task \"{}\" was initiated by {}",
                    c.str_or("task_title", "untitled"),
                    c.str_or("actor_name", "someone")
                )
            },
        ),
        EventKind::TaskHandoverAccepted => {
            rule(&[], &["old_assignee_id", "project_manager_id"], |c| {
                format!(
                    "Handover of task \"{}\" was accepted",
                    c.str_or("task_title", "untitled")
                )
            })
        }
        EventKind::TaskHandoverRejected => {
            rule(&[], &["old_assignee_id", "project_manager_id"], |c| {
                format!(
                    "Handover of task \"{}\" was rejected: {}",
                    c.str_or("task_title", "untitled"),
                    c.str_or("reason", "no reason given")
                )
            })
        }
        EventKind::TaskHandoverCompleted => rule(
            &[],
            &["new_assignee_id", "old_assignee_id", "project_manager_id"],
            |c| {
                format!(
                    "Handover of task \"{}\" is complete",
                    c.str_or("task_title", "untitled")
                )
            },
        ),

        // ── Bug sub-flow ───────────────────────────────────────────────
        EventKind::BugReported => rule(&[QualityControl], &["assignee_ids"], |c| {
            format!(
                "Bug reported on \"{}\": {}",
                c.str_or("task_title", "untitled"),
                c.str_or("reason", "no details")
            )
        }),
        EventKind::BugConfirmed => rule(&[], &["assignee_ids"], |c| {
            format!(
                "Bug \"{}\" was confirmed",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::BugFixStarted => rule(&[QaTester], &[], |c| {
            format!(
                "A fix for bug \"{}\" is in progress",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::BugReadyForRetest => rule(&[QaTester], &[], |c| {
            format!(
                "Bug \"{}\" is ready for retest",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::BugReopened => rule(&[], &["assignee_ids"], |c| {
            format!(
                "Bug \"{}\" was reopened after retest",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::BugClosed => rule(&[QualityControl], &["assignee_ids"], |c| {
            format!("Bug \"{}\" was closed", c.str_or("task_title", "untitled"))
        }),

        // ── QA flow ────────────────────────────────────────────────────
        EventKind::QaTestStarted => rule(&[], &["assignee_ids"], |c| {
            format!(
                "QA testing started on task \"{}\"",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::QaTestPassed => rule(&[ProjectManager], &["assignee_ids"], |c| {
            format!(
                "Task \"{}\" passed QA testing",
                c.str_or("task_title", "untitled")
            )
        }),
        EventKind::QaTestFailed => rule(&[QualityControl], &["assignee_ids"], |c| {
            format!(
                "Task \"{}\" failed QA testing: {}",
                c.str_or("task_title", "untitled"),
                c.str_or("reason", "no reason given")
            )
        }),

        // ── Sprint ─────────────────────────────────────────────────────
        EventKind::SprintCreated => rule(&[ProjectManager, ScrumMaster], &[], |c| {
            format!(
                "Sprint \"{}\" was created",
                c.str_or("sprint_name", "unnamed")
            )
        }),
        EventKind::SprintUpdated => rule(&[], &["member_ids"], |c| {
            format!(
                "Sprint \"{}\" was updated",
                c.str_or("sprint_name", "unnamed")
            )
        }),
        EventKind::SprintDeleted => rule(&[ProjectManager], &["member_ids"], |c| {
            format!(
                "Sprint \"{}\" was deleted",
                c.str_or("sprint_name", "unnamed")
            )
        }),
        EventKind::SprintStarted => {
            rule(&[ProjectManager, ScrumMaster], &["member_ids"], |c| {
                format!("Sprint \"{}\" started", c.str_or("sprint_name", "unnamed"))
            })
        }
        EventKind::SprintCompleted => rule(
            &[ProjectManager, ScrumMaster, ProductOwner],
            &["member_ids"],
            |c| {
                format!(
                    "Sprint \"{}\" is complete: all tasks passed review",
                    c.str_or("sprint_name", "unnamed")
                )
            },
        ),
        EventKind::SprintReopened => rule(&[ScrumMaster], &["member_ids"], |c| {
            format!(
                "Sprint \"{}\" was reopened",
                c.str_or("sprint_name", "unnamed")
            )
        }),
        EventKind::SprintMemberAdded => rule(&[], &["member_id"], |c| {
            format!(
                "You were added to sprint \"{}\"",
                c.str_or("sprint_name", "unnamed")
            )
        }),
        EventKind::SprintMemberRemoved => rule(&[], &["member_id"], |c| {
            format!(
                "You were removed from sprint \"{}\"",
                c.str_or("sprint_name", "unnamed")
            )
        }),
        EventKind::SprintTaskAdded => rule(&[], &["member_ids"], |c| {
            format!(
                "Task \"{}\" was added to sprint \"{}\"",
                c.str_or("task_title", "untitled"),
                c.str_or("sprint_name", "unnamed")
            )
        }),
        EventKind::SprintTaskRemoved => rule(&[], &["member_ids"], |c| {
            format!(
                "Task \"{}\" was removed from sprint \"{}\"",
                c.str_or("task_title", "untitled"),
                c.str_or("sprint_name", "unnamed")
            )
        }),
        EventKind::SprintAttachedToModule => {
            rule(&[ProjectManager, BusinessAnalyst], &[], |c| {
                format!(
                    "Sprint \"{}\" was attached to module \"{}\"",
                    c.str_or("sprint_name", "unnamed"),
                    c.str_or("module_name", "unnamed")
                )
            })
        }
        EventKind::SprintDetachedFromModule => {
            rule(&[ProjectManager, BusinessAnalyst], &[], |c| {
                format!(
                    "Sprint \"{}\" was detached from module \"{}\"",
                    c.str_or("sprint_name", "unnamed"),
                    c.str_or("module_name", "unnamed")
                )
            })
        }
        EventKind::SprintDeadlineApproaching => rule(&[ScrumMaster], &["member_ids"], |c| {
            format!(
                "Sprint \"{}\" ends in {} day(s)",
                c.str_or("sprint_name", "unnamed"),
                c.get_i64("days_left").unwrap_or(0)
            )
        }),
        EventKind::SprintOverdue => {
            rule(&[ProjectManager, ScrumMaster], &["member_ids"], |c| {
                format!(
                    "Sprint \"{}\" is past its end date",
                    c.str_or("sprint_name", "unnamed")
                )
            })
        }

        // ── Module ─────────────────────────────────────────────────────
        EventKind::ModuleCreated => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Module \"{}\" was proposed",
                c.str_or("module_name", "unnamed")
            )
        }),
        EventKind::ModuleUpdated => rule(&[BusinessAnalyst], &[], |c| {
            format!(
                "Module \"{}\" was updated",
                c.str_or("module_name", "unnamed")
            )
        }),
        EventKind::ModuleDeleted => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Module \"{}\" was deleted",
                c.str_or("module_name", "unnamed")
            )
        }),
        EventKind::ModuleApproved => rule(&[BusinessAnalyst, TechLead], &[], |c| {
            format!(
                "Module \"{}\" was approved",
                c.str_or("module_name", "unnamed")
            )
        }),
        EventKind::ModuleActivated => rule(&[ProjectManager, ScrumMaster], &[], |c| {
            format!(
                "Module \"{}\" is now active",
                c.str_or("module_name", "unnamed")
            )
        }),
        EventKind::ModuleReadyForRelease => rule(
            &[DevopsEngineer, ProjectManager, ProductOwner],
            &[],
            |c| {
                format!(
                    "Module \"{}\" is ready for release",
                    c.str_or("module_name", "unnamed")
                )
            },
        ),
        EventKind::ModuleReleased => rule(
            &[ProjectManager, ProductOwner, QualityControl],
            &[],
            |c| {
                format!(
                    "Module \"{}\" was released",
                    c.str_or("module_name", "unnamed")
                )
            },
        ),
        EventKind::ModuleMaintained => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Module \"{}\" entered maintenance",
                c.str_or("module_name", "unnamed")
            )
        }),
        EventKind::ModuleArchived => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Module \"{}\" was archived",
                c.str_or("module_name", "unnamed")
            )
        }),
        EventKind::ModuleProgressUpdated => rule(&[ProjectManager], &[], |c| {
            format!(
                "Module \"{}\" progress is now {}%",
                c.str_or("module_name", "unnamed"),
                c.get_i64("progress").unwrap_or(0)
            )
        }),
        EventKind::ModuleDeadlineApproaching => rule(&[ProjectManager, TechLead], &[], |c| {
            format!(
                "Module \"{}\" is due in {} day(s)",
                c.str_or("module_name", "unnamed"),
                c.get_i64("days_left").unwrap_or(0)
            )
        }),
        EventKind::ModuleOverdue => rule(
            &[ProjectManager, ProductOwner, TechLead],
            &[],
            |c| {
                format!(
                    "Module \"{}\" is past its end date",
                    c.str_or("module_name", "unnamed")
                )
            },
        ),
        EventKind::ModuleDefectDensityHigh => rule(&[QualityControl, TechLead], &[], |c| {
            format!(
                "Defect density on module \"{}\" reached {:.1}%",
                c.str_or("module_name", "unnamed"),
                c.get_f64("defect_density").unwrap_or(0.0)
            )
        }),
        EventKind::ModuleDeploymentStarted => rule(&[DevopsEngineer], &[], |c| {
            format!(
                "Deployment of module \"{}\" started",
                c.str_or("module_name", "unnamed")
            )
        }),
        EventKind::ModuleDeploymentCompleted => rule(
            &[DevopsEngineer, ProjectManager, QaTester],
            &[],
            |c| {
                format!(
                    "Deployment of module \"{}\" completed",
                    c.str_or("module_name", "unnamed")
                )
            },
        ),
        EventKind::ModuleDeploymentFailed => rule(&[DevopsEngineer, TechLead], &[], |c| {
            format!(
                "Deployment of module \"{}\" failed: {}",
                c.str_or("module_name", "unnamed"),
                c.str_or("reason", "no details")
            )
        }),

        // ── Project ────────────────────────────────────────────────────
        EventKind::ProjectCreated => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Project \"{}\" was created",
                c.str_or("project_name", "unnamed")
            )
        }),
        EventKind::ProjectUpdated => rule(&[ProjectManager], &[], |c| {
            format!(
                "Project \"{}\" was updated",
                c.str_or("project_name", "unnamed")
            )
        }),
        EventKind::ProjectDeleted => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Project \"{}\" was deleted",
                c.str_or("project_name", "unnamed")
            )
        }),
        EventKind::ProjectStarted => rule(
            &[ProjectManager, ProductOwner, ScrumMaster],
            &[],
            |c| {
                format!(
                    "Project \"{}\" is underway",
                    c.str_or("project_name", "unnamed")
                )
            },
        ),
        EventKind::ProjectCompleted => rule(
            &[ProjectManager, ProductOwner, ScrumMaster],
            &[],
            |c| {
                format!(
                    "Project \"{}\" is complete: every module reached a terminal status",
                    c.str_or("project_name", "unnamed")
                )
            },
        ),
        EventKind::ProjectReopened => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Project \"{}\" was reopened",
                c.str_or("project_name", "unnamed")
            )
        }),
        EventKind::ProjectManagerAssigned => rule(&[], &["project_manager_id"], |c| {
            format!(
                "You are now managing project \"{}\"",
                c.str_or("project_name", "unnamed")
            )
        }),
        EventKind::ProjectMemberAdded => rule(&[], &["member_id"], |c| {
            format!(
                "You were added to project \"{}\"",
                c.str_or("project_name", "unnamed")
            )
        }),
        EventKind::ProjectMemberRemoved => rule(&[], &["member_id"], |c| {
            format!(
                "You were removed from project \"{}\"",
                c.str_or("project_name", "unnamed")
            )
        }),
        EventKind::ProjectDeadlineApproaching => {
            rule(&[ProjectManager, ProductOwner], &[], |c| {
                format!(
                    "Project \"{}\" is due in {} day(s)",
                    c.str_or("project_name", "unnamed"),
                    c.get_i64("days_left").unwrap_or(0)
                )
            })
        }
        EventKind::ProjectOverdue => rule(
            &[ProjectManager, ProductOwner, ScrumMaster],
            &[],
            |c| {
                format!(
                    "Project \"{}\" is past its end date",
                    c.str_or("project_name", "unnamed")
                )
            },
        ),
        EventKind::ProjectBudgetUpdated => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Budget for project \"{}\" was updated",
                c.str_or("project_name", "unnamed")
            )
        }),
        EventKind::ProjectBudgetWarning => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Project \"{}\" has used {:.0}% of its budget",
                c.str_or("project_name", "unnamed"),
                c.get_f64("percent_used").unwrap_or(0.0)
            )
        }),
        EventKind::ProjectBudgetCritical => rule(&[ProjectManager, ProductOwner], &[], |c| {
            format!(
                "Project \"{}\" budget is critical: {:.0}% used",
                c.str_or("project_name", "unnamed"),
                c.get_f64("percent_used").unwrap_or(0.0)
            )
        }),

        // ── SLA-synthesized ────────────────────────────────────────────
        EventKind::TaskInactive => rule(&[ScrumMaster], &["assignee_ids"], |c| {
            format!(
                "Task \"{}\" has had no activity for {} hour(s)",
                c.str_or("task_title", "untitled"),
                c.get_i64("idle_hours").unwrap_or(0)
            )
        }),
        EventKind::TaskReviewStalled => rule(&[ScrumMaster], &["reviewer_ids"], |c| {
            format!(
                "Review of task \"{}\" has been pending for {} hour(s)",
                c.str_or("task_title", "untitled"),
                c.get_i64("idle_hours").unwrap_or(0)
            )
        }),
        EventKind::TaskQaStalled => rule(&[QaTester, ScrumMaster], &[], |c| {
            format!(
                "Task \"{}\" has been waiting in QA for {} hour(s)",
                c.str_or("task_title", "untitled"),
                c.get_i64("idle_hours").unwrap_or(0)
            )
        }),
    }
}
