//! Status transition tables and role gates
//!
//! The module transition graph and its per-target role gates are data, not
//! branching code. Validation runs before any state mutation or history
//! write; a rejected transition leaves the entity untouched.

use crate::store::models::{ModuleStatus, Role, TaskNode, UserNode};
use thiserror::Error;

/// Validation failure for a requested transition. The only error category
/// surfaced to the caller of a workflow operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("transition {from:?} -> {to:?} is not allowed")]
    EdgeNotAllowed { from: ModuleStatus, to: ModuleStatus },

    #[error("role {role:?} may not move a module to {target:?}")]
    RoleForbidden { role: Role, target: ModuleStatus },

    #[error("user is neither an assignee, a reviewer, nor in a coordinating role")]
    ActorForbidden,
}

/// Allowed target statuses from a given module status
pub fn allowed_targets(from: ModuleStatus) -> &'static [ModuleStatus] {
    match from {
        ModuleStatus::Proposed => &[ModuleStatus::Approved],
        ModuleStatus::Approved => &[ModuleStatus::Active],
        ModuleStatus::Active => &[ModuleStatus::ReadyForRelease],
        ModuleStatus::ReadyForRelease => &[ModuleStatus::Released],
        ModuleStatus::Released => &[ModuleStatus::Maintained, ModuleStatus::Archived],
        ModuleStatus::Maintained => &[ModuleStatus::Archived],
        ModuleStatus::Archived => &[],
    }
}

/// Roles permitted to move a module into a given target status
pub fn target_gate(target: ModuleStatus) -> &'static [Role] {
    match target {
        ModuleStatus::Proposed => &[],
        ModuleStatus::Approved => &[Role::ProjectManager, Role::ProductOwner],
        ModuleStatus::Active => &[Role::BusinessAnalyst, Role::TechLead],
        ModuleStatus::ReadyForRelease => &[Role::QaTester, Role::TechLead],
        ModuleStatus::Released => &[
            Role::DevopsEngineer,
            Role::ProjectManager,
            Role::ProductOwner,
        ],
        ModuleStatus::Maintained => &[Role::ProjectManager, Role::ProductOwner],
        ModuleStatus::Archived => &[Role::ProjectManager, Role::ProductOwner],
    }
}

/// Validate a module transition against the graph and the target gate.
/// An empty gate means the target is unrestricted.
pub fn validate_module_transition(
    current: ModuleStatus,
    target: ModuleStatus,
    role: Role,
) -> Result<(), TransitionError> {
    if !allowed_targets(current).contains(&target) {
        return Err(TransitionError::EdgeNotAllowed {
            from: current,
            to: target,
        });
    }

    let gate = target_gate(target);
    if !gate.is_empty() && !gate.contains(&role) {
        return Err(TransitionError::RoleForbidden { role, target });
    }

    Ok(())
}

/// Roles allowed to move any task regardless of membership
const TASK_COORDINATORS: &[Role] = &[Role::ProjectManager, Role::BusinessAnalyst];

/// Whether a user may change a task's status: assignees move their own task,
/// reviewers and coordinating roles move any task.
pub fn task_actor_allowed(task: &TaskNode, actor: &UserNode) -> Result<(), TransitionError> {
    if task.assignees.contains(&actor.id)
        || task.reviewers.contains(&actor.id)
        || TASK_COORDINATORS.contains(&actor.role)
    {
        Ok(())
    } else {
        Err(TransitionError::ActorForbidden)
    }
}

/// Whether a user may record a review verdict: the task's reviewers or a
/// coordinating role.
pub fn review_actor_allowed(task: &TaskNode, actor: &UserNode) -> Result<(), TransitionError> {
    if task.reviewers.contains(&actor.id) || TASK_COORDINATORS.contains(&actor.role) {
        Ok(())
    } else {
        Err(TransitionError::ActorForbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{task_in_sprint, user_with_role};
    use crate::store::models::TaskStatus;
    use uuid::Uuid;

    const ALL_STATUSES: &[ModuleStatus] = &[
        ModuleStatus::Proposed,
        ModuleStatus::Approved,
        ModuleStatus::Active,
        ModuleStatus::ReadyForRelease,
        ModuleStatus::Released,
        ModuleStatus::Maintained,
        ModuleStatus::Archived,
    ];

    #[test]
    fn test_every_allowed_edge_passes_with_gated_role() {
        for &from in ALL_STATUSES {
            for &target in allowed_targets(from) {
                let gate = target_gate(target);
                let role = gate.first().copied().unwrap_or(Role::ProjectManager);
                assert_eq!(validate_module_transition(from, target, role), Ok(()));
            }
        }
    }

    #[test]
    fn test_edges_outside_graph_reject_without_gate_check() {
        // Proposed -> Active skips Approved
        assert_eq!(
            validate_module_transition(ModuleStatus::Proposed, ModuleStatus::Active, Role::TechLead),
            Err(TransitionError::EdgeNotAllowed {
                from: ModuleStatus::Proposed,
                to: ModuleStatus::Active,
            })
        );
        // Backward move
        assert_eq!(
            validate_module_transition(
                ModuleStatus::Released,
                ModuleStatus::Active,
                Role::ProjectManager
            ),
            Err(TransitionError::EdgeNotAllowed {
                from: ModuleStatus::Released,
                to: ModuleStatus::Active,
            })
        );
    }

    #[test]
    fn test_archived_is_terminal() {
        assert!(allowed_targets(ModuleStatus::Archived).is_empty());
        for &target in ALL_STATUSES {
            assert!(
                validate_module_transition(ModuleStatus::Archived, target, Role::ProjectManager)
                    .is_err()
            );
        }
    }

    #[test]
    fn test_role_outside_gate_rejects() {
        assert_eq!(
            validate_module_transition(
                ModuleStatus::Proposed,
                ModuleStatus::Approved,
                Role::Developer
            ),
            Err(TransitionError::RoleForbidden {
                role: Role::Developer,
                target: ModuleStatus::Approved,
            })
        );
        assert_eq!(
            validate_module_transition(
                ModuleStatus::ReadyForRelease,
                ModuleStatus::Released,
                Role::QaTester
            ),
            Err(TransitionError::RoleForbidden {
                role: Role::QaTester,
                target: ModuleStatus::Released,
            })
        );
    }

    #[test]
    fn test_released_allows_two_targets() {
        let targets = allowed_targets(ModuleStatus::Released);
        assert!(targets.contains(&ModuleStatus::Maintained));
        assert!(targets.contains(&ModuleStatus::Archived));
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_assignee_may_move_own_task() {
        let actor = user_with_role(Role::Developer);
        let mut task = task_in_sprint(Uuid::new_v4(), TaskStatus::NotStarted);
        task.assignees.push(actor.id);
        assert!(task_actor_allowed(&task, &actor).is_ok());
    }

    #[test]
    fn test_reviewer_may_move_any_task() {
        let actor = user_with_role(Role::QaTester);
        let mut task = task_in_sprint(Uuid::new_v4(), TaskStatus::InReview);
        task.reviewers.push(actor.id);
        assert!(task_actor_allowed(&task, &actor).is_ok());
    }

    #[test]
    fn test_pm_and_ba_may_move_any_task() {
        let task = task_in_sprint(Uuid::new_v4(), TaskStatus::InProgress);
        for role in [Role::ProjectManager, Role::BusinessAnalyst] {
            let actor = user_with_role(role);
            assert!(task_actor_allowed(&task, &actor).is_ok());
        }
    }

    #[test]
    fn test_bystander_may_not_move_task() {
        let task = task_in_sprint(Uuid::new_v4(), TaskStatus::InProgress);
        for role in [Role::Developer, Role::QaTester, Role::ScrumMaster] {
            let actor = user_with_role(role);
            assert_eq!(
                task_actor_allowed(&task, &actor),
                Err(TransitionError::ActorForbidden)
            );
        }
    }
}
