//! Notification intents emitted by the engine after commit.
//!
//! The engine never sends mail. Mutating operations return the intents the
//! caller should deliver once the state change is durable; a failed
//! delivery is logged by the caller and never rolls anything back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EmployeeId, ProjectId, TaskId};

/// An intent for the external delivery collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A project was created and handed to its team lead.
    ProjectAssigned {
        team_lead_id: EmployeeId,
        project_id: ProjectId,
        project_name: String,
        employee_ids: Vec<EmployeeId>,
    },
    /// An employee was put on a project's roster.
    AddedToProject {
        employee_id: EmployeeId,
        project_id: ProjectId,
        project_name: String,
    },
    /// A task was assigned to an employee.
    TaskAssigned {
        employee_id: EmployeeId,
        task_id: TaskId,
        task_name: String,
        project_id: ProjectId,
        deadline: Option<DateTime<Utc>>,
    },
    /// An assignee submitted their task; the project's manager should review.
    TaskReadyForReview {
        manager_id: EmployeeId,
        task_id: TaskId,
        task_name: String,
    },
    /// A reviewer accepted the task.
    TaskAccepted {
        employee_id: EmployeeId,
        task_id: TaskId,
        task_name: String,
    },
    /// A reviewer rejected the task; the assignee should rework and resubmit.
    TaskRejected {
        employee_id: EmployeeId,
        task_id: TaskId,
        task_name: String,
        reason: String,
    },
}

impl Notification {
    /// Who this intent should be delivered to.
    pub fn recipient(&self) -> EmployeeId {
        match self {
            Notification::ProjectAssigned { team_lead_id, .. } => *team_lead_id,
            Notification::AddedToProject { employee_id, .. } => *employee_id,
            Notification::TaskAssigned { employee_id, .. } => *employee_id,
            Notification::TaskReadyForReview { manager_id, .. } => *manager_id,
            Notification::TaskAccepted { employee_id, .. } => *employee_id,
            Notification::TaskRejected { employee_id, .. } => *employee_id,
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::ProjectAssigned {
                team_lead_id,
                project_name,
                employee_ids,
                ..
            } => write!(
                f,
                "project '{project_name}' assigned to team lead {team_lead_id} with {} member(s)",
                employee_ids.len()
            ),
            Notification::AddedToProject {
                employee_id,
                project_name,
                ..
            } => write!(f, "{employee_id} added to project '{project_name}'"),
            Notification::TaskAssigned {
                employee_id,
                task_name,
                deadline,
                ..
            } => match deadline {
                Some(d) => write!(
                    f,
                    "task '{task_name}' assigned to {employee_id}, due {}",
                    d.format("%Y-%m-%d")
                ),
                None => write!(f, "task '{task_name}' assigned to {employee_id}"),
            },
            Notification::TaskReadyForReview {
                manager_id,
                task_name,
                ..
            } => write!(f, "task '{task_name}' ready for review by {manager_id}"),
            Notification::TaskAccepted {
                employee_id,
                task_name,
                ..
            } => write!(f, "task '{task_name}' accepted; {employee_id} notified"),
            Notification::TaskRejected {
                employee_id,
                task_name,
                reason,
                ..
            } => write!(
                f,
                "task '{task_name}' rejected ({reason}); {employee_id} should rework"
            ),
        }
    }
}
