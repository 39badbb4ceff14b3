//! Allocation engine. The public API for allocating work and moving it
//! through its lifecycle.
//!
//! The engine owns the storage and enforces every invariant: eligibility
//! gates, the task state machine, audit rows, and the recomputation of
//! project statistics and employee workloads. Each command runs inside a
//! single transaction: the gate and the writes it protects are atomic,
//! and a failed command leaves no partial state behind.

use chrono::Utc;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::*;
use crate::notify::Notification;
use crate::policy::{self, Availability};
use crate::storage::{Storage, TxContext};

/// The allocation engine.
pub struct Engine {
    storage: Storage,
}

/// A committed state change plus the notification intents the caller
/// should deliver now that the change is durable. Delivery failures are
/// the caller's to log; they never roll anything back.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
}

impl Engine {
    /// Create an engine with in-memory storage (for testing).
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            storage: Storage::in_memory()?,
        })
    }

    /// Create an engine backed by a file.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self {
            storage: Storage::open(path)?,
        })
    }

    // -----------------------------------------------------------------------
    // Employees
    // -----------------------------------------------------------------------

    /// Register an employee. Performance starts at the ceiling, workload
    /// at zero.
    pub fn create_employee(&mut self, new: NewEmployee) -> Result<Employee> {
        if new.name.trim().is_empty() {
            return Err(Error::ValidationFailed(
                "employee name must not be empty".to_string(),
            ));
        }
        if new.email.trim().is_empty() {
            return Err(Error::ValidationFailed(
                "employee email must not be empty".to_string(),
            ));
        }

        let employee = Employee {
            id: EmployeeId::new(),
            name: new.name,
            email: new.email,
            role: new.role,
            skills: new.skills,
            experience_years: new.experience_years,
            performance: policy::MAX_PERFORMANCE,
            workload: 0,
            is_available: true,
            created_at: Utc::now(),
        };

        self.storage
            .with_transaction(|ctx| ctx.insert_employee(&employee))?;

        info!(id = %employee.id, role = %employee.role, "employee created");
        Ok(employee)
    }

    /// Remove an employee. Restricted: fails while the employee has active
    /// task assignments or is still referenced by any task or project.
    pub fn delete_employee(&mut self, id: EmployeeId) -> Result<()> {
        self.storage.with_transaction(|ctx| {
            let employee = ctx.get_employee(id)?;

            let active = ctx.count_active_tasks(id)?;
            if active > 0 {
                return Err(Error::ValidationFailed(format!(
                    "employee {} has {active} active task assignment(s)",
                    employee.name
                )));
            }
            if ctx.employee_references(id)? > 0 {
                return Err(Error::ValidationFailed(format!(
                    "employee {} is still referenced by tasks or projects",
                    employee.name
                )));
            }

            ctx.delete_employee(id)
        })?;

        info!(%id, "employee deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Create a project with its proposed members.
    ///
    /// Every proposed employee must pass the availability gate; the first
    /// failure aborts the whole transaction: no partial project, no member
    /// links, no timeline row.
    pub fn create_project(
        &mut self,
        new: NewProject,
        members: &[EmployeeId],
        actor: &Actor,
    ) -> Result<Committed<Project>> {
        match actor.role {
            Role::Manager => {}
            Role::TeamLead | Role::Member => {
                return Err(Error::Unauthorized(
                    "only a manager may create projects".to_string(),
                ));
            }
        }
        if new.name.trim().is_empty() {
            return Err(Error::ValidationFailed(
                "project name must not be empty".to_string(),
            ));
        }
        if new.end_date < new.start_date {
            return Err(Error::ValidationFailed(
                "project end date precedes start date".to_string(),
            ));
        }
        if members.is_empty() {
            return Err(Error::ValidationFailed(
                "at least one employee must be assigned to the project".to_string(),
            ));
        }

        let project = Project {
            id: ProjectId::new(),
            name: new.name,
            description: new.description,
            requirements: new.requirements,
            category: new.category,
            start_date: new.start_date,
            end_date: new.end_date,
            status: ProjectStatus::Active,
            manager_id: Some(actor.id),
            team_lead_id: new.team_lead_id,
            member_ids: members.to_vec(),
            stats: ProjectStats::default(),
            created_at: Utc::now(),
        };

        let (project, notifications) = self.storage.with_transaction(|ctx| {
            // Eligibility is evaluated inside the transaction, against
            // current state, never cached.
            let mut employees = Vec::with_capacity(members.len());
            for id in members {
                let employee = ctx.get_employee(*id)?;
                check_eligibility(ctx, &employee)?;
                employees.push(employee);
            }

            ctx.insert_project(&project)?;
            for employee in &employees {
                ctx.add_project_member(project.id, employee.id)?;
            }
            ctx.record_timeline(
                project.id,
                "Project Created",
                &format!("Project '{}' was created", project.name),
                actor.id,
                ProjectStatus::Active.color(),
            )?;

            let mut notifications = Vec::new();
            if let Some(team_lead_id) = project.team_lead_id {
                notifications.push(Notification::ProjectAssigned {
                    team_lead_id,
                    project_id: project.id,
                    project_name: project.name.clone(),
                    employee_ids: members.to_vec(),
                });
            }
            for employee in &employees {
                notifications.push(Notification::AddedToProject {
                    employee_id: employee.id,
                    project_id: project.id,
                    project_name: project.name.clone(),
                });
            }

            Ok((ctx.get_project(project.id)?, notifications))
        })?;

        info!(id = %project.id, members = members.len(), "project created");
        Ok(Committed {
            value: project,
            notifications,
        })
    }

    /// Delete a project, cascading its tasks, history, timeline, and
    /// member links. Former assignees' workloads are refreshed.
    pub fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        self.storage.with_transaction(|ctx| {
            ctx.get_project(id)?;
            let assignees = ctx.project_assignees(id)?;

            ctx.delete_project(id)?;

            for employee_id in assignees {
                let employee = ctx.get_employee(employee_id)?;
                refresh_standing(ctx, employee_id, employee.performance)?;
            }
            Ok(())
        })?;

        info!(%id, "project deleted");
        Ok(())
    }

    /// Set a project's status by managerial decision: on hold, cancelled,
    /// or back to active. Distinct from the automatic completion flip in
    /// that it is explicit, manager-only, and may move in any direction.
    pub fn set_project_status(
        &mut self,
        project_id: ProjectId,
        status: ProjectStatus,
        actor: &Actor,
    ) -> Result<Project> {
        match actor.role {
            Role::Manager => {}
            Role::TeamLead | Role::Member => {
                return Err(Error::Unauthorized(
                    "only a manager may change a project's status".to_string(),
                ));
            }
        }

        let actor_id = actor.id;
        let project = self.storage.with_transaction(move |ctx| {
            let project = ctx.get_project(project_id)?;
            if project.status == status {
                return Ok(project);
            }

            ctx.set_project_status(project_id, status)?;
            ctx.record_timeline(
                project_id,
                "Project Status Changed",
                &format!("Project '{}' status changed to {status}", project.name),
                actor_id,
                status.color(),
            )?;
            ctx.get_project(project_id)
        })?;

        info!(id = %project_id, %status, "project status set");
        Ok(project)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Create a task under a project. Starts in ToDo; if an assignee is
    /// named up front they must pass the availability gate.
    pub fn create_task(
        &mut self,
        project_id: ProjectId,
        new: NewTask,
        actor: &Actor,
    ) -> Result<Committed<Task>> {
        if new.name.trim().is_empty() {
            return Err(Error::ValidationFailed(
                "task name must not be empty".to_string(),
            ));
        }

        let task = Task {
            id: TaskId::new(),
            project_id,
            name: new.name,
            description: new.description,
            assignee: new.assignee,
            status: TaskStatus::ToDo,
            priority: new.priority,
            deadline: new.deadline,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            reviewed_at: None,
            review_comments: None,
        };

        let (task, notifications) = self.storage.with_transaction(|ctx| {
            ctx.get_project(project_id)?;

            let mut notifications = Vec::new();
            if let Some(assignee_id) = task.assignee {
                let employee = ctx.get_employee(assignee_id)?;
                check_eligibility(ctx, &employee)?;

                ctx.insert_task(&task)?;
                refresh_standing(ctx, assignee_id, employee.performance)?;

                notifications.push(Notification::TaskAssigned {
                    employee_id: assignee_id,
                    task_id: task.id,
                    task_name: task.name.clone(),
                    project_id,
                    deadline: task.deadline,
                });
            } else {
                ctx.insert_task(&task)?;
            }

            recompute_project(ctx, project_id, actor.id)?;
            ctx.record_timeline(
                project_id,
                "Task Created",
                &format!("Task '{}' was created", task.name),
                actor.id,
                "#0000FF",
            )?;

            Ok((ctx.get_task(task.id)?, notifications))
        })?;

        info!(id = %task.id, project = %project_id, "task created");
        Ok(Committed {
            value: task,
            notifications,
        })
    }

    /// Assign (or reassign) a task to an employee, gated by availability.
    pub fn assign_task(
        &mut self,
        task_id: TaskId,
        employee_id: EmployeeId,
        actor: &Actor,
    ) -> Result<Committed<Task>> {
        let (task, notifications) = self.storage.with_transaction(|ctx| {
            let mut task = ctx.get_task(task_id)?;
            if task.status.is_terminal() {
                return Err(Error::ValidationFailed(
                    "cannot assign a completed task".to_string(),
                ));
            }

            let employee = ctx.get_employee(employee_id)?;
            check_eligibility(ctx, &employee)?;

            let previous = task.assignee;
            task.assignee = Some(employee_id);
            ctx.update_task(&task)?;

            refresh_standing(ctx, employee_id, employee.performance)?;
            if let Some(prev_id) = previous.filter(|p| *p != employee_id) {
                let prev = ctx.get_employee(prev_id)?;
                refresh_standing(ctx, prev_id, prev.performance)?;
            }

            ctx.append_history(
                task.id,
                task.status,
                task.status,
                actor.id,
                Some(&format!("Assigned to {}", employee.name)),
            )?;
            recompute_project(ctx, task.project_id, actor.id)?;

            let notifications = vec![Notification::TaskAssigned {
                employee_id,
                task_id: task.id,
                task_name: task.name.clone(),
                project_id: task.project_id,
                deadline: task.deadline,
            }];
            Ok((task, notifications))
        })?;

        info!(id = %task_id, assignee = %employee_id, "task assigned");
        Ok(Committed {
            value: task,
            notifications,
        })
    }

    /// Delete a task, cascading its history. The project's counters and
    /// the former assignee's workload are recomputed in the same
    /// transaction.
    pub fn delete_task(&mut self, task_id: TaskId, actor: &Actor) -> Result<()> {
        self.storage.with_transaction(|ctx| {
            let task = ctx.get_task(task_id)?;

            ctx.delete_task(task_id)?;

            if let Some(assignee_id) = task.assignee {
                let employee = ctx.get_employee(assignee_id)?;
                refresh_standing(ctx, assignee_id, employee.performance)?;
            }
            recompute_project(ctx, task.project_id, actor.id)?;
            Ok(())
        })?;

        info!(id = %task_id, "task deleted");
        Ok(())
    }

    /// Move a task from `from` to `to`.
    ///
    /// `from` is the status the caller last observed. If the task has
    /// moved since, the command fails with `ConflictingUpdate`; a retry
    /// is only idempotent while the from-state still matches.
    pub fn change_task_status(
        &mut self,
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
        actor: &Actor,
        comment: Option<&str>,
    ) -> Result<Committed<Task>> {
        let actor = *actor;
        let (task, notifications) = self.storage.with_transaction(move |ctx| {
            let mut task = ctx.get_task(task_id)?;

            if task.status != from {
                return Err(Error::ConflictingUpdate {
                    expected: from,
                    actual: task.status,
                });
            }
            if !from.can_transition_to(to) {
                return Err(Error::InvalidTransition { from, to });
            }

            let now = Utc::now();
            let mut notifications = Vec::new();
            let history_comment: Option<String>;
            // Some(true) = accepted review, Some(false) = rejected review.
            let score_outcome: Option<bool>;

            use TaskStatus::*;
            match (from, to) {
                (ToDo, InProgress) => {
                    require_assignee(&task, &actor)?;
                    task.started_at = Some(now);
                    history_comment = comment.map(str::to_string);
                    score_outcome = None;
                }
                (InProgress, Review) => {
                    require_assignee(&task, &actor)?;
                    task.completed_at = Some(now);
                    history_comment = comment.map(str::to_string);
                    score_outcome = None;

                    let project = ctx.get_project(task.project_id)?;
                    if let Some(manager_id) = project.manager_id {
                        notifications.push(Notification::TaskReadyForReview {
                            manager_id,
                            task_id: task.id,
                            task_name: task.name.clone(),
                        });
                    }
                }
                (Review, Done) => {
                    require_reviewer(&actor)?;
                    task.reviewed_at = Some(now);
                    history_comment =
                        Some(comment.unwrap_or("Task accepted and marked as done").to_string());
                    score_outcome = Some(true);
                }
                (Review, InProgress) => {
                    require_reviewer(&actor)?;
                    let reason = comment
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .ok_or_else(|| {
                            Error::ValidationFailed("a rejection reason is required".to_string())
                        })?;
                    task.review_comments = Some(reason.to_string());
                    history_comment = Some(format!("Task rejected: {reason}"));
                    score_outcome = Some(false);
                }
                _ => return Err(Error::InvalidTransition { from, to }),
            }

            task.status = to;
            ctx.update_task(&task)?;

            // Score and workload move after the task write so the active
            // set already reflects the transition.
            if let (Some(accepted), Some(assignee_id)) = (score_outcome, task.assignee) {
                let employee = ctx.get_employee(assignee_id)?;
                let performance = policy::adjust_performance(employee.performance, accepted);
                refresh_standing(ctx, assignee_id, performance)?;

                if accepted {
                    notifications.push(Notification::TaskAccepted {
                        employee_id: assignee_id,
                        task_id: task.id,
                        task_name: task.name.clone(),
                    });
                } else {
                    notifications.push(Notification::TaskRejected {
                        employee_id: assignee_id,
                        task_id: task.id,
                        task_name: task.name.clone(),
                        reason: task.review_comments.clone().unwrap_or_default(),
                    });
                }
            }

            // Exactly one history row per accepted transition, in the same
            // transaction; the change isn't durable without its audit.
            ctx.append_history(task.id, from, to, actor.id, history_comment.as_deref())?;

            recompute_project(ctx, task.project_id, actor.id)?;
            ctx.record_timeline(
                task.project_id,
                "Task Status Changed",
                &format!("Task '{}' status changed to {to}", task.name),
                actor.id,
                task.priority.color(),
            )?;

            Ok((task, notifications))
        })?;

        info!(id = %task_id, %from, %to, "task status changed");
        Ok(Committed {
            value: task,
            notifications,
        })
    }

    /// Assignee starts working: ToDo → InProgress.
    pub fn start_task(&mut self, task_id: TaskId, actor: &Actor) -> Result<Committed<Task>> {
        self.change_task_status(task_id, TaskStatus::ToDo, TaskStatus::InProgress, actor, None)
    }

    /// Assignee submits for review: InProgress → Review.
    pub fn complete_task(&mut self, task_id: TaskId, actor: &Actor) -> Result<Committed<Task>> {
        self.change_task_status(
            task_id,
            TaskStatus::InProgress,
            TaskStatus::Review,
            actor,
            None,
        )
    }

    /// Reviewer accepts: Review → Done.
    pub fn accept_task(&mut self, task_id: TaskId, actor: &Actor) -> Result<Committed<Task>> {
        self.change_task_status(task_id, TaskStatus::Review, TaskStatus::Done, actor, None)
    }

    /// Reviewer rejects with a reason: Review → InProgress for rework.
    pub fn reject_task(
        &mut self,
        task_id: TaskId,
        actor: &Actor,
        reason: &str,
    ) -> Result<Committed<Task>> {
        self.change_task_status(
            task_id,
            TaskStatus::Review,
            TaskStatus::InProgress,
            actor,
            Some(reason),
        )
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn employee(&self, id: EmployeeId) -> Result<Employee> {
        self.storage.get_employee(id)
    }

    pub fn list_employees(&self) -> Result<Vec<Employee>> {
        self.storage.list_employees()
    }

    pub fn project(&self, id: ProjectId) -> Result<Project> {
        self.storage.get_project(id)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.storage.list_projects()
    }

    pub fn task(&self, id: TaskId) -> Result<Task> {
        self.storage.get_task(id)
    }

    pub fn tasks_for_project(&self, project_id: ProjectId) -> Result<Vec<Task>> {
        self.storage.tasks_for_project(project_id)
    }

    pub fn history_for_task(&self, task_id: TaskId) -> Result<Vec<TaskHistory>> {
        self.storage.history_for_task(task_id)
    }

    pub fn timeline_for_project(&self, project_id: ProjectId) -> Result<Vec<TimelineEvent>> {
        self.storage.timeline_for_project(project_id)
    }

    /// Human-facing availability summary, derived from current state.
    pub fn availability_status(&self, id: EmployeeId) -> Result<Availability> {
        let employee = self.storage.get_employee(id)?;
        let workload = policy::compute_workload(self.storage.count_active_tasks(id)?);
        Ok(Availability::of(employee.performance, workload))
    }
}

// ---------------------------------------------------------------------------
// Invariant helpers. All take the transaction context so gates and the
// writes they protect stay atomic.
// ---------------------------------------------------------------------------

/// The composite assignment gate, evaluated against the employee's current
/// active task count.
fn check_eligibility(ctx: &TxContext, employee: &Employee) -> Result<()> {
    let workload = policy::compute_workload(ctx.count_active_tasks(employee.id)?);
    policy::can_assign(employee.performance, workload).map_err(|gate| Error::IneligibleEmployee {
        name: employee.name.clone(),
        gate,
    })
}

/// Recompute and persist an employee's derived fields. Workload is always
/// a function of the current active count, never patched incrementally.
fn refresh_standing(ctx: &TxContext, employee_id: EmployeeId, performance: i32) -> Result<()> {
    let workload = policy::compute_workload(ctx.count_active_tasks(employee_id)?);
    ctx.update_employee_standing(
        employee_id,
        performance,
        workload,
        policy::is_available(performance),
    )
}

/// Recompute a project's statistics from its task set and persist them.
/// An active project whose completion reaches 100% flips to Completed,
/// one-way, never automatically reverted.
fn recompute_project(ctx: &TxContext, project_id: ProjectId, actor: EmployeeId) -> Result<Project> {
    let stats = ctx.task_counts(project_id)?;
    ctx.set_project_stats(project_id, &stats)?;

    let project = ctx.get_project(project_id)?;
    if project.status == ProjectStatus::Active
        && stats.total_tasks > 0
        && stats.completion_percentage >= 100
    {
        ctx.set_project_status(project_id, ProjectStatus::Completed)?;
        ctx.record_timeline(
            project_id,
            "Project Status Changed",
            &format!("Project '{}' completed", project.name),
            actor,
            ProjectStatus::Completed.color(),
        )?;
        return ctx.get_project(project_id);
    }
    Ok(project)
}

/// Only the task's current assignee may move it forward.
fn require_assignee(task: &Task, actor: &Actor) -> Result<()> {
    match task.assignee {
        Some(id) if id == actor.id => Ok(()),
        Some(_) => Err(Error::Unauthorized(
            "only the task's assignee may move it".to_string(),
        )),
        None => Err(Error::Unauthorized(
            "task has no assignee".to_string(),
        )),
    }
}

/// Only a manager or team lead may deliver a review verdict.
fn require_reviewer(actor: &Actor) -> Result<()> {
    match actor.role {
        Role::Manager | Role::TeamLead => Ok(()),
        Role::Member => Err(Error::Unauthorized(
            "only a manager or team lead may review tasks".to_string(),
        )),
    }
}
