//! Core data model.
//!
//! An employee carries a performance score and a derived workload. A project
//! exclusively owns its tasks and a set of member employees. A task belongs
//! to exactly one project and moves through a review-gated lifecycle.
//! History and timeline rows are the append-only audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Newtype for employee IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub Uuid);

/// Newtype for project IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

/// Newtype for task IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

macro_rules! id_impls {
    ($name:ident) => {
        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                // Short display: first 8 chars of UUID
                write!(f, "{}", &self.0.to_string()[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

id_impls!(EmployeeId);
id_impls!(ProjectId);
id_impls!(TaskId);

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Organizational role. A closed set: every decision point matches
/// exhaustively, there is no default-role fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    TeamLead,
    Member,
}

impl Role {
    /// May this role review (accept/reject) submitted tasks?
    pub fn can_review(self) -> bool {
        match self {
            Role::Manager | Role::TeamLead => true,
            Role::Member => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Manager => "manager",
            Role::TeamLead => "team_lead",
            Role::Member => "member",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" => Ok(Role::Manager),
            "team_lead" => Ok(Role::TeamLead),
            "member" => Ok(Role::Member),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// The identity a command is executed as: who, and in what role.
/// Supplied by the caller with every mutating operation; used for
/// ownership checks and history attribution.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: EmployeeId,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Employee
// ---------------------------------------------------------------------------

/// Someone work can be allocated to.
///
/// `performance`, `workload`, and `is_available` are owned by the engine;
/// callers never set them directly. Performance starts at 100 and is moved
/// only by review outcomes; workload and availability are recomputed from
/// current state on every mutation that could change them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub skills: Vec<String>,
    pub experience_years: u32,
    /// Review-outcome score, clamped to 40..=100.
    pub performance: i32,
    /// Percentage derived from active task count (10 tasks = 100).
    pub workload: i32,
    /// Derived flag: performance at or above the floor.
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Lifecycle state of a task.
///
/// Rejection is not a state: a rejected review sends the task back to
/// `InProgress` with the reviewer's reason, and the assignee resubmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, waiting for the assignee to start.
    ToDo,
    /// Assignee actively working (or reworking after a rejection).
    InProgress,
    /// Submitted, waiting for a reviewer's verdict.
    Review,
    /// Accepted. Terminal.
    Done,
}

impl TaskStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (ToDo, InProgress)
                | (InProgress, Review)
                | (Review, Done)
                | (Review, InProgress) // rejected, back for rework
        )
    }

    /// Does this status count toward the assignee's workload?
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::ToDo | TaskStatus::InProgress | TaskStatus::Review)
    }

    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::ToDo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::ToDo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("unknown task status: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Task priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    Major,
    Medium,
    Minor,
    Low,
}

impl TaskPriority {
    /// Display color for timeline rendering.
    pub fn color(self) -> &'static str {
        match self {
            TaskPriority::Critical => "#FF0000",
            TaskPriority::Major => "#FFA500",
            TaskPriority::Medium => "#FFFF00",
            TaskPriority::Minor => "#00FF00",
            TaskPriority::Low => "#00FFFF",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskPriority::Critical => "critical",
            TaskPriority::Major => "major",
            TaskPriority::Medium => "medium",
            TaskPriority::Minor => "minor",
            TaskPriority::Low => "low",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(TaskPriority::Critical),
            "major" => Ok(TaskPriority::Major),
            "medium" => Ok(TaskPriority::Medium),
            "minor" => Ok(TaskPriority::Minor),
            "low" => Ok(TaskPriority::Low),
            _ => Err(format!("unknown task priority: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of allocatable work. Belongs to exactly one project; assignee is
/// empty until someone eligible is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    pub assignee: Option<EmployeeId>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Latest reviewer feedback (set on rejection).
    pub review_comments: Option<String>,
}

impl Task {
    /// Past its deadline and not yet accepted.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.deadline.is_some_and(|d| d < now)
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Completed,
    OnHold,
    Cancelled,
}

impl ProjectStatus {
    /// Display color for timeline rendering.
    pub fn color(self) -> &'static str {
        match self {
            ProjectStatus::Active => "#00FF00",
            ProjectStatus::Completed => "#0000FF",
            ProjectStatus::OnHold => "#FFFF00",
            ProjectStatus::Cancelled => "#FF0000",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "on_hold" => Ok(ProjectStatus::OnHold),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            _ => Err(format!("unknown project status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectCategory {
    Critical,
    Major,
    Medium,
    Minor,
    Low,
}

impl std::fmt::Display for ProjectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectCategory::Critical => "critical",
            ProjectCategory::Major => "major",
            ProjectCategory::Medium => "medium",
            ProjectCategory::Minor => "minor",
            ProjectCategory::Low => "low",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProjectCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(ProjectCategory::Critical),
            "major" => Ok(ProjectCategory::Major),
            "medium" => Ok(ProjectCategory::Medium),
            "minor" => Ok(ProjectCategory::Minor),
            "low" => Ok(ProjectCategory::Low),
            _ => Err(format!("unknown project category: {s}")),
        }
    }
}

/// Stored task statistics, recomputed from the task set on every mutation.
/// Never settable by callers: the engine derives, the storage persists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub in_progress_tasks: i64,
    pub pending_tasks: i64,
    /// completed * 100 / total, 0 when the project has no tasks.
    pub completion_percentage: i64,
}

/// A body of work with an owning manager, an optional team lead, member
/// employees, and an exclusively-owned set of tasks (cascade delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub requirements: String,
    pub category: ProjectCategory,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ProjectStatus,
    pub manager_id: Option<EmployeeId>,
    pub team_lead_id: Option<EmployeeId>,
    pub member_ids: Vec<EmployeeId>,
    pub stats: ProjectStats,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit records
// ---------------------------------------------------------------------------

/// Append-only record of one accepted task transition (or assignment).
/// Exactly one row per accepted change; never mutated, deleted only when
/// the owning task is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHistory {
    /// Row id, assigned by storage.
    pub id: i64,
    pub task_id: TaskId,
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,
    pub actor: EmployeeId,
    pub changed_at: DateTime<Utc>,
    pub comment: Option<String>,
}

/// Append-only project-level event, separate from per-task history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Row id, assigned by storage.
    pub id: i64,
    pub project_id: ProjectId,
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub description: String,
    pub actor: EmployeeId,
    /// Display color (hex) for timeline rendering.
    pub color: String,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Builder for creating employees.
pub struct NewEmployee {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) role: Role,
    pub(crate) skills: Vec<String>,
    pub(crate) experience_years: u32,
}

impl NewEmployee {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role,
            skills: Vec::new(),
            experience_years: 0,
        }
    }

    pub fn skills(mut self, skills: Vec<String>) -> Self {
        self.skills = skills;
        self
    }

    pub fn experience_years(mut self, years: u32) -> Self {
        self.experience_years = years;
        self
    }
}

/// Builder for creating projects.
pub struct NewProject {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) requirements: String,
    pub(crate) category: ProjectCategory,
    pub(crate) start_date: DateTime<Utc>,
    pub(crate) end_date: DateTime<Utc>,
    pub(crate) team_lead_id: Option<EmployeeId>,
}

impl NewProject {
    pub fn new(
        name: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            requirements: String::new(),
            category: ProjectCategory::Medium,
            start_date,
            end_date,
            team_lead_id: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn requirements(mut self, requirements: impl Into<String>) -> Self {
        self.requirements = requirements.into();
        self
    }

    pub fn category(mut self, category: ProjectCategory) -> Self {
        self.category = category;
        self
    }

    pub fn team_lead(mut self, team_lead_id: EmployeeId) -> Self {
        self.team_lead_id = Some(team_lead_id);
        self
    }
}

/// Builder for creating tasks.
pub struct NewTask {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) priority: TaskPriority,
    pub(crate) deadline: Option<DateTime<Utc>>,
    pub(crate) assignee: Option<EmployeeId>,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            priority: TaskPriority::Medium,
            deadline: None,
            assignee: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn assignee(mut self, employee_id: EmployeeId) -> Self {
        self.assignee = Some(employee_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_legal() {
        assert!(TaskStatus::ToDo.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Review));
        assert!(TaskStatus::Review.can_transition_to(TaskStatus::Done));
        assert!(TaskStatus::Review.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn skipping_review_is_illegal() {
        assert!(!TaskStatus::ToDo.can_transition_to(TaskStatus::Done));
        assert!(!TaskStatus::ToDo.can_transition_to(TaskStatus::Review));
        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::Done));
    }

    #[test]
    fn done_is_terminal() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::Done.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Done.can_transition_to(TaskStatus::Review));
        assert!(!TaskStatus::Done.can_transition_to(TaskStatus::ToDo));
    }

    #[test]
    fn active_statuses_count_toward_workload() {
        assert!(TaskStatus::ToDo.is_active());
        assert!(TaskStatus::InProgress.is_active());
        assert!(TaskStatus::Review.is_active());
        assert!(!TaskStatus::Done.is_active());
    }

    #[test]
    fn status_round_trips_through_display() {
        for status in [
            TaskStatus::ToDo,
            TaskStatus::InProgress,
            TaskStatus::Review,
            TaskStatus::Done,
        ] {
            assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
        }
    }

    #[test]
    fn overdue_requires_deadline_and_non_terminal_status() {
        let now = Utc::now();
        let mut task = Task {
            id: TaskId::new(),
            project_id: ProjectId::new(),
            name: "t".to_string(),
            description: String::new(),
            assignee: None,
            status: TaskStatus::InProgress,
            priority: TaskPriority::Medium,
            deadline: Some(now - chrono::Duration::hours(1)),
            created_at: now,
            started_at: None,
            completed_at: None,
            reviewed_at: None,
            review_comments: None,
        };
        assert!(task.is_overdue(now));

        task.status = TaskStatus::Done;
        assert!(!task.is_overdue(now));

        task.status = TaskStatus::InProgress;
        task.deadline = None;
        assert!(!task.is_overdue(now));
    }
}
