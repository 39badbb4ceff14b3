//! SQLite storage layer.
//!
//! Single source of truth for employees, projects, tasks, and the two
//! append-only audit tables. WAL mode for concurrent read access. All
//! writes go through the engine, and every mutating engine operation runs
//! inside one transaction; SQLite's writer lock is what serializes
//! concurrent commands against the same rows.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::*;

/// Storage backend. Owns the SQLite connection.
pub struct Storage {
    conn: Connection,
}

/// Handle for performing storage operations within a transaction.
///
/// All methods delegate to the same SQL logic as `Storage`, but execute
/// against the transaction's connection. Either all operations commit
/// together or none do.
pub(crate) struct TxContext<'a> {
    tx: &'a Connection,
}

impl TxContext<'_> {
    pub fn insert_employee(&self, employee: &Employee) -> Result<()> {
        insert_employee_on(self.tx, employee)
    }

    pub fn get_employee(&self, id: EmployeeId) -> Result<Employee> {
        get_employee_on(self.tx, id)
    }

    /// Persist the engine-owned derived fields of an employee.
    pub fn update_employee_standing(
        &self,
        id: EmployeeId,
        performance: i32,
        workload: i32,
        is_available: bool,
    ) -> Result<()> {
        self.tx.execute(
            "UPDATE employees SET performance = ?1, workload = ?2, is_available = ?3 WHERE id = ?4",
            params![performance, workload, is_available, id.0.to_string()],
        )?;
        Ok(())
    }

    pub fn count_active_tasks(&self, employee_id: EmployeeId) -> Result<i64> {
        count_active_tasks_on(self.tx, employee_id)
    }

    /// How many tasks or projects still reference this employee, in any
    /// role. Deletion is restricted while this is non-zero.
    pub fn employee_references(&self, id: EmployeeId) -> Result<i64> {
        let id = id.0.to_string();
        let count = self.tx.query_row(
            "SELECT (SELECT COUNT(*) FROM tasks WHERE assignee = ?1)
                  + (SELECT COUNT(*) FROM projects WHERE manager_id = ?1 OR team_lead_id = ?1)
                  + (SELECT COUNT(*) FROM project_members WHERE employee_id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn delete_employee(&self, id: EmployeeId) -> Result<()> {
        self.tx.execute(
            "DELETE FROM employees WHERE id = ?1",
            params![id.0.to_string()],
        )?;
        Ok(())
    }

    pub fn insert_project(&self, project: &Project) -> Result<()> {
        self.tx.execute(
            "INSERT INTO projects (
                id, name, description, requirements, category, start_date,
                end_date, status, manager_id, team_lead_id, total_tasks,
                completed_tasks, in_progress_tasks, pending_tasks,
                completion_percentage, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                project.id.0.to_string(),
                project.name,
                project.description,
                project.requirements,
                project.category.to_string(),
                project.start_date.to_rfc3339(),
                project.end_date.to_rfc3339(),
                project.status.to_string(),
                project.manager_id.map(|id| id.0.to_string()),
                project.team_lead_id.map(|id| id.0.to_string()),
                project.stats.total_tasks,
                project.stats.completed_tasks,
                project.stats.in_progress_tasks,
                project.stats.pending_tasks,
                project.stats.completion_percentage,
                project.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn add_project_member(&self, project_id: ProjectId, employee_id: EmployeeId) -> Result<()> {
        self.tx.execute(
            "INSERT OR IGNORE INTO project_members (project_id, employee_id) VALUES (?1, ?2)",
            params![project_id.0.to_string(), employee_id.0.to_string()],
        )?;
        Ok(())
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Project> {
        get_project_on(self.tx, id)
    }

    /// Write the recomputed statistics back onto the project row.
    pub fn set_project_stats(&self, id: ProjectId, stats: &ProjectStats) -> Result<()> {
        self.tx.execute(
            "UPDATE projects SET total_tasks = ?1, completed_tasks = ?2,
             in_progress_tasks = ?3, pending_tasks = ?4, completion_percentage = ?5
             WHERE id = ?6",
            params![
                stats.total_tasks,
                stats.completed_tasks,
                stats.in_progress_tasks,
                stats.pending_tasks,
                stats.completion_percentage,
                id.0.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn set_project_status(&self, id: ProjectId, status: ProjectStatus) -> Result<()> {
        self.tx.execute(
            "UPDATE projects SET status = ?1 WHERE id = ?2",
            params![status.to_string(), id.0.to_string()],
        )?;
        Ok(())
    }

    /// Derive fresh statistics from the project's current task set.
    pub fn task_counts(&self, project_id: ProjectId) -> Result<ProjectStats> {
        let (total, completed, in_progress, pending): (i64, i64, i64, i64) = self.tx.query_row(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'done'),
                    COUNT(*) FILTER (WHERE status = 'in_progress'),
                    COUNT(*) FILTER (WHERE status = 'todo')
             FROM tasks WHERE project_id = ?1",
            params![project_id.0.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        Ok(ProjectStats {
            total_tasks: total,
            completed_tasks: completed,
            in_progress_tasks: in_progress,
            pending_tasks: pending,
            completion_percentage: if total > 0 { completed * 100 / total } else { 0 },
        })
    }

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.tx.execute(
            "INSERT INTO tasks (
                id, project_id, name, description, assignee, status, priority,
                deadline, created_at, started_at, completed_at, reviewed_at,
                review_comments
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                task.id.0.to_string(),
                task.project_id.0.to_string(),
                task.name,
                task.description,
                task.assignee.map(|id| id.0.to_string()),
                task.status.to_string(),
                task.priority.to_string(),
                task.deadline.map(|d| d.to_rfc3339()),
                task.created_at.to_rfc3339(),
                task.started_at.map(|d| d.to_rfc3339()),
                task.completed_at.map(|d| d.to_rfc3339()),
                task.reviewed_at.map(|d| d.to_rfc3339()),
                task.review_comments,
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: TaskId) -> Result<Task> {
        get_task_on(self.tx, id)
    }

    /// Write a task's mutable state back. Identity, project, and created_at
    /// never change after insert.
    pub fn update_task(&self, task: &Task) -> Result<()> {
        self.tx.execute(
            "UPDATE tasks SET assignee = ?1, status = ?2, priority = ?3,
             deadline = ?4, started_at = ?5, completed_at = ?6, reviewed_at = ?7,
             review_comments = ?8 WHERE id = ?9",
            params![
                task.assignee.map(|id| id.0.to_string()),
                task.status.to_string(),
                task.priority.to_string(),
                task.deadline.map(|d| d.to_rfc3339()),
                task.started_at.map(|d| d.to_rfc3339()),
                task.completed_at.map(|d| d.to_rfc3339()),
                task.reviewed_at.map(|d| d.to_rfc3339()),
                task.review_comments,
                task.id.0.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Remove a task and its history (cascade).
    pub fn delete_task(&self, id: TaskId) -> Result<()> {
        self.tx.execute(
            "DELETE FROM task_history WHERE task_id = ?1",
            params![id.0.to_string()],
        )?;
        self.tx
            .execute("DELETE FROM tasks WHERE id = ?1", params![id.0.to_string()])?;
        Ok(())
    }

    /// Remove a project and everything it owns: tasks, their history,
    /// timeline events, and member links.
    pub fn delete_project(&self, id: ProjectId) -> Result<()> {
        let id = id.0.to_string();
        self.tx.execute(
            "DELETE FROM task_history WHERE task_id IN
             (SELECT id FROM tasks WHERE project_id = ?1)",
            params![id],
        )?;
        self.tx
            .execute("DELETE FROM tasks WHERE project_id = ?1", params![id])?;
        self.tx.execute(
            "DELETE FROM project_timeline WHERE project_id = ?1",
            params![id],
        )?;
        self.tx.execute(
            "DELETE FROM project_members WHERE project_id = ?1",
            params![id],
        )?;
        self.tx
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Distinct assignees of a project's tasks (for workload refresh before
    /// a cascade delete).
    pub fn project_assignees(&self, project_id: ProjectId) -> Result<Vec<EmployeeId>> {
        let mut stmt = self.tx.prepare(
            "SELECT DISTINCT assignee FROM tasks
             WHERE project_id = ?1 AND assignee IS NOT NULL",
        )?;
        let ids = stmt
            .query_map(params![project_id.0.to_string()], |row| {
                let s: String = row.get(0)?;
                parse_col::<Uuid>(0, s).map(EmployeeId)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Append one history row. Returns the stored record.
    pub fn append_history(
        &self,
        task_id: TaskId,
        from_status: TaskStatus,
        to_status: TaskStatus,
        actor: EmployeeId,
        comment: Option<&str>,
    ) -> Result<TaskHistory> {
        let now = Utc::now();
        self.tx.execute(
            "INSERT INTO task_history (task_id, from_status, to_status, actor, changed_at, comment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                task_id.0.to_string(),
                from_status.to_string(),
                to_status.to_string(),
                actor.0.to_string(),
                now.to_rfc3339(),
                comment,
            ],
        )?;

        Ok(TaskHistory {
            id: self.tx.last_insert_rowid(),
            task_id,
            from_status,
            to_status,
            actor,
            changed_at: now,
            comment: comment.map(str::to_string),
        })
    }

    /// Append one project-level timeline event.
    pub fn record_timeline(
        &self,
        project_id: ProjectId,
        event: &str,
        description: &str,
        actor: EmployeeId,
        color: &str,
    ) -> Result<TimelineEvent> {
        let now = Utc::now();
        self.tx.execute(
            "INSERT INTO project_timeline (project_id, timestamp, event, description, actor, color)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project_id.0.to_string(),
                now.to_rfc3339(),
                event,
                description,
                actor.0.to_string(),
                color,
            ],
        )?;

        Ok(TimelineEvent {
            id: self.tx.last_insert_rowid(),
            project_id,
            timestamp: now,
            event: event.to_string(),
            description: description.to_string(),
            actor,
            color: color.to_string(),
        })
    }
}

impl Storage {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mut storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    fn init(&mut self) -> Result<()> {
        // WAL mode for concurrent readers
        self.conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        self.conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS employees (
                id                  TEXT PRIMARY KEY,
                name                TEXT NOT NULL,
                email               TEXT NOT NULL,
                role                TEXT NOT NULL,
                skills              TEXT NOT NULL DEFAULT '[]',
                experience_years    INTEGER NOT NULL DEFAULT 0,
                performance         INTEGER NOT NULL DEFAULT 100,
                workload            INTEGER NOT NULL DEFAULT 0,
                is_available        INTEGER NOT NULL DEFAULT 1,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                id                    TEXT PRIMARY KEY,
                name                  TEXT NOT NULL,
                description           TEXT NOT NULL DEFAULT '',
                requirements          TEXT NOT NULL DEFAULT '',
                category              TEXT NOT NULL,
                start_date            TEXT NOT NULL,
                end_date              TEXT NOT NULL,
                status                TEXT NOT NULL DEFAULT 'active',
                manager_id            TEXT REFERENCES employees(id),
                team_lead_id          TEXT REFERENCES employees(id),
                total_tasks           INTEGER NOT NULL DEFAULT 0,
                completed_tasks       INTEGER NOT NULL DEFAULT 0,
                in_progress_tasks     INTEGER NOT NULL DEFAULT 0,
                pending_tasks         INTEGER NOT NULL DEFAULT 0,
                completion_percentage INTEGER NOT NULL DEFAULT 0,
                created_at            TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS project_members (
                project_id   TEXT NOT NULL REFERENCES projects(id),
                employee_id  TEXT NOT NULL REFERENCES employees(id),
                PRIMARY KEY (project_id, employee_id)
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id               TEXT PRIMARY KEY,
                project_id       TEXT NOT NULL REFERENCES projects(id),
                name             TEXT NOT NULL,
                description      TEXT NOT NULL DEFAULT '',
                assignee         TEXT REFERENCES employees(id),
                status           TEXT NOT NULL DEFAULT 'todo',
                priority         TEXT NOT NULL DEFAULT 'medium',
                deadline         TEXT,
                created_at       TEXT NOT NULL,
                started_at       TEXT,
                completed_at     TEXT,
                reviewed_at      TEXT,
                review_comments  TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee, status)
                WHERE assignee IS NOT NULL;

            CREATE TABLE IF NOT EXISTS task_history (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id      TEXT NOT NULL REFERENCES tasks(id),
                from_status  TEXT NOT NULL,
                to_status    TEXT NOT NULL,
                actor        TEXT NOT NULL,
                changed_at   TEXT NOT NULL,
                comment      TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_history_task ON task_history(task_id, id);

            CREATE TABLE IF NOT EXISTS project_timeline (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id   TEXT NOT NULL REFERENCES projects(id),
                timestamp    TEXT NOT NULL,
                event        TEXT NOT NULL,
                description  TEXT NOT NULL,
                actor        TEXT NOT NULL,
                color        TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_timeline_project ON project_timeline(project_id, id);
            ",
        )?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Execute a closure within a SQLite transaction.
    ///
    /// The transaction commits if the closure returns Ok, rolls back on Err.
    pub(crate) fn with_transaction<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TxContext) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        let mut ctx = TxContext { tx: &tx };
        let result = f(&mut ctx)?;
        tx.commit()?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get_employee(&self, id: EmployeeId) -> Result<Employee> {
        get_employee_on(&self.conn, id)
    }

    pub fn list_employees(&self) -> Result<Vec<Employee>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EMPLOYEE_SELECT} ORDER BY created_at ASC"))?;
        let employees = stmt
            .query_map([], row_to_employee)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(employees)
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Project> {
        get_project_on(&self.conn, id)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM projects ORDER BY created_at ASC")?;
        let ids = stmt
            .query_map([], |row| {
                let s: String = row.get(0)?;
                parse_col::<Uuid>(0, s).map(ProjectId)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        ids.into_iter()
            .map(|id| get_project_on(&self.conn, id))
            .collect()
    }

    pub fn get_task(&self, id: TaskId) -> Result<Task> {
        get_task_on(&self.conn, id)
    }

    pub fn tasks_for_project(&self, project_id: ProjectId) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT} WHERE project_id = ?1 ORDER BY created_at ASC"
        ))?;
        let tasks = stmt
            .query_map(params![project_id.0.to_string()], row_to_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn history_for_task(&self, task_id: TaskId) -> Result<Vec<TaskHistory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, from_status, to_status, actor, changed_at, comment
             FROM task_history WHERE task_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![task_id.0.to_string()], |row| {
                Ok(TaskHistory {
                    id: row.get(0)?,
                    task_id: TaskId(parse_col(1, row.get::<_, String>(1)?)?),
                    from_status: parse_col(2, row.get::<_, String>(2)?)?,
                    to_status: parse_col(3, row.get::<_, String>(3)?)?,
                    actor: EmployeeId(parse_col(4, row.get::<_, String>(4)?)?),
                    changed_at: parse_col(5, row.get::<_, String>(5)?)?,
                    comment: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn timeline_for_project(&self, project_id: ProjectId) -> Result<Vec<TimelineEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, timestamp, event, description, actor, color
             FROM project_timeline WHERE project_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![project_id.0.to_string()], |row| {
                Ok(TimelineEvent {
                    id: row.get(0)?,
                    project_id: ProjectId(parse_col(1, row.get::<_, String>(1)?)?),
                    timestamp: parse_col(2, row.get::<_, String>(2)?)?,
                    event: row.get(3)?,
                    description: row.get(4)?,
                    actor: EmployeeId(parse_col(5, row.get::<_, String>(5)?)?),
                    color: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_active_tasks(&self, employee_id: EmployeeId) -> Result<i64> {
        count_active_tasks_on(&self.conn, employee_id)
    }
}

// ---------------------------------------------------------------------------
// Inner functions accept &Connection so they work with both
// Connection (auto-commit) and Transaction (deref to Connection).
// ---------------------------------------------------------------------------

const EMPLOYEE_SELECT: &str = "SELECT id, name, email, role, skills, experience_years,
    performance, workload, is_available, created_at FROM employees";

const TASK_SELECT: &str = "SELECT id, project_id, name, description, assignee, status,
    priority, deadline, created_at, started_at, completed_at, reviewed_at,
    review_comments FROM tasks";

fn insert_employee_on(conn: &Connection, employee: &Employee) -> Result<()> {
    conn.execute(
        "INSERT INTO employees (
            id, name, email, role, skills, experience_years, performance,
            workload, is_available, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            employee.id.0.to_string(),
            employee.name,
            employee.email,
            employee.role.to_string(),
            serde_json::to_string(&employee.skills).unwrap_or_else(|_| "[]".to_string()),
            employee.experience_years,
            employee.performance,
            employee.workload,
            employee.is_available,
            employee.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn get_employee_on(conn: &Connection, id: EmployeeId) -> Result<Employee> {
    conn.query_row(
        &format!("{EMPLOYEE_SELECT} WHERE id = ?1"),
        params![id.0.to_string()],
        row_to_employee,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("employee {id}")))
}

fn get_project_on(conn: &Connection, id: ProjectId) -> Result<Project> {
    let mut project = conn
        .query_row(
            "SELECT id, name, description, requirements, category, start_date,
                end_date, status, manager_id, team_lead_id, total_tasks,
                completed_tasks, in_progress_tasks, pending_tasks,
                completion_percentage, created_at
             FROM projects WHERE id = ?1",
            params![id.0.to_string()],
            row_to_project,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("project {id}")))?;

    let mut stmt = conn.prepare(
        "SELECT employee_id FROM project_members WHERE project_id = ?1 ORDER BY employee_id",
    )?;
    project.member_ids = stmt
        .query_map(params![id.0.to_string()], |row| {
            let s: String = row.get(0)?;
            parse_col::<Uuid>(0, s).map(EmployeeId)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(project)
}

fn get_task_on(conn: &Connection, id: TaskId) -> Result<Task> {
    conn.query_row(
        &format!("{TASK_SELECT} WHERE id = ?1"),
        params![id.0.to_string()],
        row_to_task,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("task {id}")))
}

fn count_active_tasks_on(conn: &Connection, employee_id: EmployeeId) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM tasks
         WHERE assignee = ?1 AND status IN ('todo', 'in_progress', 'review')",
        params![employee_id.0.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// Row parsing helpers
// ---------------------------------------------------------------------------

/// Parse a text column through FromStr, mapping failures to a conversion
/// error on the column index.
fn parse_col<T>(idx: usize, s: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    s.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn opt_col<T>(idx: usize, s: Option<String>) -> rusqlite::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    s.map(|s| parse_col(idx, s)).transpose()
}

fn row_to_employee(row: &rusqlite::Row) -> rusqlite::Result<Employee> {
    let skills: String = row.get(4)?;
    Ok(Employee {
        id: EmployeeId(parse_col(0, row.get::<_, String>(0)?)?),
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_col(3, row.get::<_, String>(3)?)?,
        skills: serde_json::from_str(&skills).unwrap_or_default(),
        experience_years: row.get::<_, i64>(5)? as u32,
        performance: row.get(6)?,
        workload: row.get(7)?,
        is_available: row.get(8)?,
        created_at: parse_col(9, row.get::<_, String>(9)?)?,
    })
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: ProjectId(parse_col(0, row.get::<_, String>(0)?)?),
        name: row.get(1)?,
        description: row.get(2)?,
        requirements: row.get(3)?,
        category: parse_col(4, row.get::<_, String>(4)?)?,
        start_date: parse_col(5, row.get::<_, String>(5)?)?,
        end_date: parse_col(6, row.get::<_, String>(6)?)?,
        status: parse_col(7, row.get::<_, String>(7)?)?,
        manager_id: opt_col::<Uuid>(8, row.get(8)?)?.map(EmployeeId),
        team_lead_id: opt_col::<Uuid>(9, row.get(9)?)?.map(EmployeeId),
        member_ids: Vec::new(), // filled in by get_project_on
        stats: ProjectStats {
            total_tasks: row.get(10)?,
            completed_tasks: row.get(11)?,
            in_progress_tasks: row.get(12)?,
            pending_tasks: row.get(13)?,
            completion_percentage: row.get(14)?,
        },
        created_at: parse_col(15, row.get::<_, String>(15)?)?,
    })
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: TaskId(parse_col(0, row.get::<_, String>(0)?)?),
        project_id: ProjectId(parse_col(1, row.get::<_, String>(1)?)?),
        name: row.get(2)?,
        description: row.get(3)?,
        assignee: opt_col::<Uuid>(4, row.get(4)?)?.map(EmployeeId),
        status: parse_col(5, row.get::<_, String>(5)?)?,
        priority: parse_col(6, row.get::<_, String>(6)?)?,
        deadline: opt_col::<DateTime<Utc>>(7, row.get(7)?)?,
        created_at: parse_col(8, row.get::<_, String>(8)?)?,
        started_at: opt_col::<DateTime<Utc>>(9, row.get(9)?)?,
        completed_at: opt_col::<DateTime<Utc>>(10, row.get(10)?)?,
        reviewed_at: opt_col::<DateTime<Utc>>(11, row.get(11)?)?,
        review_comments: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_employee() -> Employee {
        Employee {
            id: EmployeeId::new(),
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
            role: Role::Member,
            skills: vec!["rust".to_string(), "sql".to_string()],
            experience_years: 4,
            performance: 100,
            workload: 0,
            is_available: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn employee_round_trips() {
        let mut storage = Storage::in_memory().unwrap();
        let employee = sample_employee();
        storage
            .with_transaction(|ctx| ctx.insert_employee(&employee))
            .unwrap();

        let loaded = storage.get_employee(employee.id).unwrap();
        assert_eq!(loaded.name, "Dana");
        assert_eq!(loaded.skills, vec!["rust", "sql"]);
        assert_eq!(loaded.performance, 100);
        assert!(loaded.is_available);
    }

    #[test]
    fn missing_employee_is_not_found() {
        let storage = Storage::in_memory().unwrap();
        let err = storage.get_employee(EmployeeId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn history_rows_come_back_in_append_order() {
        let mut storage = Storage::in_memory().unwrap();
        let employee = sample_employee();
        let project = Project {
            id: ProjectId::new(),
            name: "p".to_string(),
            description: String::new(),
            requirements: String::new(),
            category: ProjectCategory::Medium,
            start_date: Utc::now(),
            end_date: Utc::now(),
            status: ProjectStatus::Active,
            manager_id: None,
            team_lead_id: None,
            member_ids: Vec::new(),
            stats: ProjectStats::default(),
            created_at: Utc::now(),
        };
        let task = Task {
            id: TaskId::new(),
            project_id: project.id,
            name: "t".to_string(),
            description: String::new(),
            assignee: Some(employee.id),
            status: TaskStatus::ToDo,
            priority: TaskPriority::Medium,
            deadline: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            reviewed_at: None,
            review_comments: None,
        };

        storage
            .with_transaction(|ctx| {
                ctx.insert_employee(&employee)?;
                ctx.insert_project(&project)?;
                ctx.insert_task(&task)?;
                ctx.append_history(
                    task.id,
                    TaskStatus::ToDo,
                    TaskStatus::InProgress,
                    employee.id,
                    None,
                )?;
                ctx.append_history(
                    task.id,
                    TaskStatus::InProgress,
                    TaskStatus::Review,
                    employee.id,
                    Some("submitted"),
                )?;
                Ok(())
            })
            .unwrap();

        let history = storage.history_for_task(task.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to_status, TaskStatus::InProgress);
        assert_eq!(history[1].to_status, TaskStatus::Review);
        assert_eq!(history[1].comment.as_deref(), Some("submitted"));
        assert!(history[0].id < history[1].id);
    }

    #[test]
    fn failed_transaction_leaves_no_rows() {
        let mut storage = Storage::in_memory().unwrap();
        let employee = sample_employee();

        let result: Result<()> = storage.with_transaction(|ctx| {
            ctx.insert_employee(&employee)?;
            Err(Error::ValidationFailed("forced rollback".to_string()))
        });
        assert!(result.is_err());

        assert!(matches!(
            storage.get_employee(employee.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alloc.db");
        let employee = sample_employee();

        {
            let mut storage = Storage::open(&path).unwrap();
            storage
                .with_transaction(|ctx| ctx.insert_employee(&employee))
                .unwrap();
        }

        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.get_employee(employee.id).unwrap().name, "Dana");
    }
}
