//! taskalloc CLI: operator interface to the allocation engine.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use taskalloc::config::Config;
use taskalloc::engine::{Committed, Engine};
use taskalloc::model::*;
use taskalloc::notify::Notification;

#[derive(Parser)]
#[command(name = "taskalloc", about = "Task allocation and performance engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Employee operations
    Employee {
        #[command(subcommand)]
        action: EmployeeAction,
    },
    /// Project operations
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Task operations
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Show a project's timeline
    Timeline {
        /// Project ID (full UUID or prefix)
        project: String,
    },
    /// Show a task's history
    History {
        /// Task ID (full UUID or prefix)
        task: String,
    },
}

#[derive(Subcommand)]
enum EmployeeAction {
    /// Register an employee
    Add {
        name: String,
        email: String,
        /// Role: manager, team_lead, or member
        role: String,
        /// Comma-separated skill list
        #[arg(long)]
        skills: Option<String>,
        /// Years of experience
        #[arg(long, default_value_t = 0)]
        experience: u32,
    },
    /// List employees with availability
    List,
    /// Show one employee
    Show { id: String },
    /// Remove an employee (fails while they hold assignments)
    Delete { id: String },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project with its member employees
    Create {
        name: String,
        /// Start date (YYYY-MM-DD)
        start: String,
        /// End date (YYYY-MM-DD)
        end: String,
        /// Acting manager (employee ID)
        #[arg(long)]
        actor: String,
        /// Member employee IDs (at least one)
        #[arg(long, required = true, num_args = 1..)]
        members: Vec<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        requirements: Option<String>,
        /// Category: critical, major, medium, minor, or low
        #[arg(long)]
        category: Option<String>,
        /// Team lead (employee ID)
        #[arg(long)]
        team_lead: Option<String>,
    },
    /// Set a project's status by managerial decision
    SetStatus {
        id: String,
        /// Status: active, completed, on_hold, or cancelled
        status: String,
        /// Acting manager (employee ID)
        #[arg(long)]
        actor: String,
    },
    /// List projects with their statistics
    List,
    /// Show one project and its tasks
    Show { id: String },
    /// Delete a project and everything it owns
    Delete { id: String },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Create a task under a project
    Create {
        project: String,
        name: String,
        /// Acting user (employee ID)
        #[arg(long)]
        actor: String,
        #[arg(long)]
        description: Option<String>,
        /// Priority: critical, major, medium, minor, or low
        #[arg(long)]
        priority: Option<String>,
        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
        /// Assignee (employee ID)
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Assign a task to an employee
    Assign {
        task: String,
        employee: String,
        #[arg(long)]
        actor: String,
    },
    /// Assignee starts work (todo -> in_progress)
    Start {
        task: String,
        #[arg(long)]
        actor: String,
    },
    /// Assignee submits for review (in_progress -> review)
    Complete {
        task: String,
        #[arg(long)]
        actor: String,
    },
    /// Reviewer accepts (review -> done)
    Accept {
        task: String,
        #[arg(long)]
        actor: String,
    },
    /// Reviewer rejects with a reason (review -> in_progress)
    Reject {
        task: String,
        reason: String,
        #[arg(long)]
        actor: String,
    },
    /// Show one task
    Show { id: String },
    /// List a project's tasks
    List { project: String },
    /// Delete a task
    Delete {
        task: String,
        #[arg(long)]
        actor: String,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_logging(&config);

    let cli = Cli::parse();
    let mut engine = Engine::open(&config.database_path)?;

    match cli.command {
        Command::Employee { action } => run_employee(&mut engine, action),
        Command::Project { action } => run_project(&mut engine, action),
        Command::Task { action } => run_task(&mut engine, action),
        Command::Timeline { project } => {
            let project_id = resolve_project(&engine, &project)?;
            for event in engine.timeline_for_project(project_id)? {
                println!(
                    "{}  {:<22}  {}",
                    event.timestamp.format("%Y-%m-%d %H:%M"),
                    event.event,
                    event.description
                );
            }
            Ok(())
        }
        Command::History { task } => {
            let task_id = resolve_task(&engine, &task)?;
            for entry in engine.history_for_task(task_id)? {
                println!(
                    "{}  {} -> {}  by {}  {}",
                    entry.changed_at.format("%Y-%m-%d %H:%M"),
                    entry.from_status,
                    entry.to_status,
                    entry.actor,
                    entry.comment.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}

fn init_logging(config: &Config) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Stand-in for the external delivery collaborator: log each intent.
/// Fire-and-forget; nothing here can undo the committed change.
fn deliver(notifications: &[Notification]) {
    for n in notifications {
        info!(recipient = %n.recipient(), "notification: {n}");
    }
}

fn run_employee(engine: &mut Engine, action: EmployeeAction) -> anyhow::Result<()> {
    match action {
        EmployeeAction::Add {
            name,
            email,
            role,
            skills,
            experience,
        } => {
            let role: Role = role.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let skills = skills
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();

            let employee = engine.create_employee(
                NewEmployee::new(name, email, role)
                    .skills(skills)
                    .experience_years(experience),
            )?;
            println!("Created: {} ({})", employee.id, employee.name);
            Ok(())
        }
        EmployeeAction::List => {
            println!(
                "{:<8}  {:<20}  {:<10}  {:<4}  {:<4}  {:<16}  BADGE",
                "ID", "NAME", "ROLE", "PERF", "LOAD", "STATUS"
            );
            println!("{}", "-".repeat(78));
            for employee in engine.list_employees()? {
                let status = engine.availability_status(employee.id)?;
                println!(
                    "{:<8}  {:<20}  {:<10}  {:<4}  {:<4}  {:<16}  {}",
                    employee.id.to_string(),
                    employee.name,
                    employee.role.to_string(),
                    employee.performance,
                    employee.workload,
                    status.to_string(),
                    status.color()
                );
            }
            Ok(())
        }
        EmployeeAction::Show { id } => {
            let id = resolve_employee(engine, &id)?;
            let employee = engine.employee(id)?;
            println!("ID:          {}", employee.id);
            println!("Name:        {}", employee.name);
            println!("Email:       {}", employee.email);
            println!("Role:        {}", employee.role);
            println!("Skills:      {}", employee.skills.join(", "));
            println!("Experience:  {} year(s)", employee.experience_years);
            println!("Performance: {}", employee.performance);
            println!("Workload:    {}", employee.workload);
            let status = engine.availability_status(id)?;
            println!("Status:      {status} ({})", status.color());
            Ok(())
        }
        EmployeeAction::Delete { id } => {
            let id = resolve_employee(engine, &id)?;
            engine.delete_employee(id)?;
            println!("Deleted: {id}");
            Ok(())
        }
    }
}

fn run_project(engine: &mut Engine, action: ProjectAction) -> anyhow::Result<()> {
    match action {
        ProjectAction::Create {
            name,
            start,
            end,
            actor,
            members,
            description,
            requirements,
            category,
            team_lead,
        } => {
            let actor = resolve_actor(engine, &actor)?;
            let members = members
                .iter()
                .map(|m| resolve_employee(engine, m))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let mut new = NewProject::new(name, parse_date(&start)?, parse_date(&end)?);
            if let Some(description) = description {
                new = new.description(description);
            }
            if let Some(requirements) = requirements {
                new = new.requirements(requirements);
            }
            if let Some(category) = category {
                new = new.category(category.parse().map_err(|e: String| anyhow::anyhow!(e))?);
            }
            if let Some(team_lead) = team_lead {
                new = new.team_lead(resolve_employee(engine, &team_lead)?);
            }

            let Committed {
                value: project,
                notifications,
            } = engine.create_project(new, &members, &actor)?;
            deliver(&notifications);
            println!("Created: {} ({})", project.id, project.name);
            Ok(())
        }
        ProjectAction::SetStatus { id, status, actor } => {
            let id = resolve_project(engine, &id)?;
            let status: ProjectStatus = status.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let actor = resolve_actor(engine, &actor)?;
            let project = engine.set_project_status(id, status, &actor)?;
            println!("{}: {}", project.id, project.status);
            Ok(())
        }
        ProjectAction::List => {
            println!(
                "{:<8}  {:<24}  {:<10}  {:>5}  {:>5}  DONE%",
                "ID", "NAME", "STATUS", "TASKS", "DONE"
            );
            println!("{}", "-".repeat(70));
            for project in engine.list_projects()? {
                println!(
                    "{:<8}  {:<24}  {:<10}  {:>5}  {:>5}  {:>4}%",
                    project.id.to_string(),
                    project.name,
                    project.status.to_string(),
                    project.stats.total_tasks,
                    project.stats.completed_tasks,
                    project.stats.completion_percentage
                );
            }
            Ok(())
        }
        ProjectAction::Show { id } => {
            let id = resolve_project(engine, &id)?;
            let project = engine.project(id)?;
            println!("ID:          {}", project.id);
            println!("Name:        {}", project.name);
            println!("Status:      {}", project.status);
            println!("Category:    {}", project.category);
            println!(
                "Dates:       {} .. {}",
                project.start_date.format("%Y-%m-%d"),
                project.end_date.format("%Y-%m-%d")
            );
            println!("Members:     {}", project.member_ids.len());
            println!(
                "Tasks:       {} total, {} done, {} in progress, {} pending ({}%)",
                project.stats.total_tasks,
                project.stats.completed_tasks,
                project.stats.in_progress_tasks,
                project.stats.pending_tasks,
                project.stats.completion_percentage
            );
            for task in engine.tasks_for_project(id)? {
                println!(
                    "  {:<8}  {:<12}  {:<30}  {}",
                    task.id.to_string(),
                    task.status.to_string(),
                    task.name,
                    task.assignee
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(())
        }
        ProjectAction::Delete { id } => {
            let id = resolve_project(engine, &id)?;
            engine.delete_project(id)?;
            println!("Deleted: {id}");
            Ok(())
        }
    }
}

fn run_task(engine: &mut Engine, action: TaskAction) -> anyhow::Result<()> {
    match action {
        TaskAction::Create {
            project,
            name,
            actor,
            description,
            priority,
            deadline,
            assignee,
        } => {
            let project_id = resolve_project(engine, &project)?;
            let actor = resolve_actor(engine, &actor)?;

            let mut new = NewTask::new(name);
            if let Some(description) = description {
                new = new.description(description);
            }
            if let Some(priority) = priority {
                new = new.priority(priority.parse().map_err(|e: String| anyhow::anyhow!(e))?);
            }
            if let Some(deadline) = deadline {
                new = new.deadline(parse_date(&deadline)?);
            }
            if let Some(assignee) = assignee {
                new = new.assignee(resolve_employee(engine, &assignee)?);
            }

            let Committed {
                value: task,
                notifications,
            } = engine.create_task(project_id, new, &actor)?;
            deliver(&notifications);
            println!("Created: {} ({})", task.id, task.name);
            Ok(())
        }
        TaskAction::Assign {
            task,
            employee,
            actor,
        } => {
            let task_id = resolve_task(engine, &task)?;
            let employee_id = resolve_employee(engine, &employee)?;
            let actor = resolve_actor(engine, &actor)?;

            let committed = engine.assign_task(task_id, employee_id, &actor)?;
            deliver(&committed.notifications);
            println!("Assigned: {} -> {}", committed.value.id, employee_id);
            Ok(())
        }
        TaskAction::Start { task, actor } => transition(engine, &task, &actor, |e, t, a| {
            e.start_task(t, a)
        }),
        TaskAction::Complete { task, actor } => transition(engine, &task, &actor, |e, t, a| {
            e.complete_task(t, a)
        }),
        TaskAction::Accept { task, actor } => transition(engine, &task, &actor, |e, t, a| {
            e.accept_task(t, a)
        }),
        TaskAction::Reject {
            task,
            reason,
            actor,
        } => transition(engine, &task, &actor, move |e, t, a| {
            e.reject_task(t, a, &reason)
        }),
        TaskAction::Show { id } => {
            let id = resolve_task(engine, &id)?;
            let task = engine.task(id)?;
            println!("ID:        {}", task.id);
            println!("Project:   {}", task.project_id);
            println!("Name:      {}", task.name);
            println!("Status:    {}", task.status);
            println!("Priority:  {}", task.priority);
            println!(
                "Assignee:  {}",
                task.assignee
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            if let Some(deadline) = task.deadline {
                let overdue = if task.is_overdue(Utc::now()) {
                    " (overdue)"
                } else {
                    ""
                };
                println!("Deadline:  {}{overdue}", deadline.format("%Y-%m-%d"));
            }
            if let Some(ref comments) = task.review_comments {
                println!("Review:    {comments}");
            }
            Ok(())
        }
        TaskAction::List { project } => {
            let project_id = resolve_project(engine, &project)?;
            for task in engine.tasks_for_project(project_id)? {
                println!(
                    "{:<8}  {:<12}  {:<10}  {:<30}  {}",
                    task.id.to_string(),
                    task.status.to_string(),
                    task.priority.to_string(),
                    task.name,
                    task.assignee
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(())
        }
        TaskAction::Delete { task, actor } => {
            let task_id = resolve_task(engine, &task)?;
            let actor = resolve_actor(engine, &actor)?;
            engine.delete_task(task_id, &actor)?;
            println!("Deleted: {task_id}");
            Ok(())
        }
    }
}

fn transition<F>(engine: &mut Engine, task: &str, actor: &str, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut Engine, TaskId, &Actor) -> taskalloc::error::Result<Committed<Task>>,
{
    let task_id = resolve_task(engine, task)?;
    let actor = resolve_actor(engine, actor)?;
    let committed = f(engine, task_id, &actor)?;
    deliver(&committed.notifications);
    println!("{}: {}", committed.value.id, committed.value.status);
    Ok(())
}

// ---------------------------------------------------------------------------
// Id resolution: accept full UUIDs or unambiguous prefixes.
// ---------------------------------------------------------------------------

fn parse_date(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("invalid date: {s}"))?;
    Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
}

fn resolve_actor(engine: &Engine, id: &str) -> anyhow::Result<Actor> {
    let id = resolve_employee(engine, id)?;
    let employee = engine.employee(id)?;
    Ok(Actor {
        id,
        role: employee.role,
    })
}

fn resolve_employee(engine: &Engine, s: &str) -> anyhow::Result<EmployeeId> {
    if let Ok(uuid) = s.parse() {
        return Ok(EmployeeId(uuid));
    }
    let matches: Vec<_> = engine
        .list_employees()?
        .into_iter()
        .filter(|e| e.id.0.to_string().starts_with(s))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no employee matching '{s}'"),
        1 => Ok(matches[0].id),
        n => anyhow::bail!("{n} employees match prefix '{s}', be more specific"),
    }
}

fn resolve_project(engine: &Engine, s: &str) -> anyhow::Result<ProjectId> {
    if let Ok(uuid) = s.parse() {
        return Ok(ProjectId(uuid));
    }
    let matches: Vec<_> = engine
        .list_projects()?
        .into_iter()
        .filter(|p| p.id.0.to_string().starts_with(s))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no project matching '{s}'"),
        1 => Ok(matches[0].id),
        n => anyhow::bail!("{n} projects match prefix '{s}', be more specific"),
    }
}

fn resolve_task(engine: &Engine, s: &str) -> anyhow::Result<TaskId> {
    if let Ok(uuid) = s.parse() {
        return Ok(TaskId(uuid));
    }
    let mut matches = Vec::new();
    for project in engine.list_projects()? {
        for task in engine.tasks_for_project(project.id)? {
            if task.id.0.to_string().starts_with(s) {
                matches.push(task.id);
            }
        }
    }
    match matches.len() {
        0 => anyhow::bail!("no task matching '{s}'"),
        1 => Ok(matches[0]),
        n => anyhow::bail!("{n} tasks match prefix '{s}', be more specific"),
    }
}
