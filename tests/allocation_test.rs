//! Eligibility gates, workload accounting, and project-statistics
//! consistency under the allocation engine.

use chrono::{Duration, Utc};
use taskalloc::engine::Engine;
use taskalloc::error::Error;
use taskalloc::model::*;
use taskalloc::policy::{Availability, Gate, MIN_PERFORMANCE};

fn engine() -> Engine {
    Engine::in_memory().unwrap()
}

fn add_employee(engine: &mut Engine, name: &str, role: Role) -> Employee {
    engine
        .create_employee(NewEmployee::new(name, format!("{name}@example.com"), role))
        .unwrap()
}

fn actor(employee: &Employee) -> Actor {
    Actor {
        id: employee.id,
        role: employee.role,
    }
}

fn add_project(engine: &mut Engine, name: &str, manager: &Employee, members: &[EmployeeId]) -> Project {
    let now = Utc::now();
    engine
        .create_project(
            NewProject::new(name, now, now + Duration::days(30)),
            members,
            &actor(manager),
        )
        .unwrap()
        .value
}

/// Give an employee `n` active tasks under `project`.
fn saturate(engine: &mut Engine, project: ProjectId, dev: &Employee, manager: &Employee, n: usize) {
    for i in 0..n {
        engine
            .create_task(
                project,
                NewTask::new(format!("task-{i}")).assignee(dev.id),
                &actor(manager),
            )
            .unwrap();
    }
}

#[test]
fn workload_caps_at_ten_active_tasks() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    saturate(&mut engine, project.id, &dev, &manager, 10);
    assert_eq!(engine.employee(dev.id).unwrap().workload, 100);
    assert_eq!(
        engine.availability_status(dev.id).unwrap(),
        Availability::Overloaded
    );

    // The eleventh assignment trips the workload gate.
    let err = engine
        .create_task(
            project.id,
            NewTask::new("one too many").assignee(dev.id),
            &actor(&manager),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::IneligibleEmployee {
            gate: Gate::Workload,
            ..
        }
    ));

    // The failed creation left no task behind.
    assert_eq!(engine.tasks_for_project(project.id).unwrap().len(), 10);
    assert_eq!(engine.project(project.id).unwrap().stats.total_tasks, 10);
}

#[test]
fn overloaded_employee_cannot_be_reassigned_either() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let idle = add_employee(&mut engine, "alex", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id, idle.id]);

    saturate(&mut engine, project.id, &dev, &manager, 10);
    let spare = engine
        .create_task(project.id, NewTask::new("spare").assignee(idle.id), &actor(&manager))
        .unwrap()
        .value;

    let err = engine.assign_task(spare.id, dev.id, &actor(&manager)).unwrap_err();
    assert!(matches!(
        err,
        Error::IneligibleEmployee {
            gate: Gate::Workload,
            ..
        }
    ));
    assert_eq!(engine.task(spare.id).unwrap().assignee, Some(idle.id));
}

#[test]
fn ineligible_member_aborts_project_creation_atomically() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let busy = add_employee(&mut engine, "sam", Role::Member);
    let idle = add_employee(&mut engine, "alex", Role::Member);
    let existing = add_project(&mut engine, "Apollo", &manager, &[busy.id]);

    saturate(&mut engine, existing.id, &busy, &manager, 10);

    // One overloaded member poisons the whole proposal. No project row,
    // no member links, no timeline.
    let now = Utc::now();
    let err = engine
        .create_project(
            NewProject::new("Borealis", now, now + Duration::days(30)),
            &[idle.id, busy.id],
            &actor(&manager),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::IneligibleEmployee {
            gate: Gate::Workload,
            ..
        }
    ));
    assert_eq!(engine.list_projects().unwrap().len(), 1);
}

#[test]
fn twelve_rejections_floor_performance_at_minimum() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    let task = engine
        .create_task(project.id, NewTask::new("cursed").assignee(dev.id), &actor(&manager))
        .unwrap()
        .value;
    engine.start_task(task.id, &actor(&dev)).unwrap();

    for round in 0..12 {
        engine.complete_task(task.id, &actor(&dev)).unwrap();
        engine
            .reject_task(task.id, &actor(&manager), &format!("attempt {round} rejected"))
            .unwrap();
    }

    let dev = engine.employee(dev.id).unwrap();
    assert_eq!(dev.performance, MIN_PERFORMANCE);
    assert!(dev.is_available);

    // One history row per rejection, plus the submissions and the start.
    let history = engine.history_for_task(task.id).unwrap();
    let rejections = history
        .iter()
        .filter(|h| h.from_status == TaskStatus::Review && h.to_status == TaskStatus::InProgress)
        .count();
    assert_eq!(rejections, 12);
}

#[test]
fn deleting_a_task_recomputes_stats_and_workload() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    saturate(&mut engine, project.id, &dev, &manager, 3);
    let tasks = engine.tasks_for_project(project.id).unwrap();
    let victim = tasks[0].id;
    engine.start_task(victim, &actor(&dev)).unwrap();

    let stats = engine.project(project.id).unwrap().stats;
    assert_eq!(stats.total_tasks, 3);
    assert_eq!(stats.in_progress_tasks, 1);
    assert_eq!(stats.pending_tasks, 2);

    engine.delete_task(victim, &actor(&manager)).unwrap();

    let stats = engine.project(project.id).unwrap().stats;
    assert_eq!(stats.total_tasks, 2);
    assert_eq!(stats.in_progress_tasks, 0);
    assert_eq!(stats.pending_tasks, 2);
    assert_eq!(engine.employee(dev.id).unwrap().workload, 20);

    assert!(matches!(engine.task(victim), Err(Error::NotFound(_))));
}

#[test]
fn completion_percentage_tracks_the_task_set() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    saturate(&mut engine, project.id, &dev, &manager, 2);
    let tasks = engine.tasks_for_project(project.id).unwrap();

    for task in &tasks {
        engine.start_task(task.id, &actor(&dev)).unwrap();
        engine.complete_task(task.id, &actor(&dev)).unwrap();
        engine.accept_task(task.id, &actor(&manager)).unwrap();
    }

    let project_after = engine.project(project.id).unwrap();
    assert_eq!(project_after.stats.completion_percentage, 100);
    assert_eq!(project_after.status, ProjectStatus::Completed);
}

#[test]
fn completed_status_never_flips_back() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    let task = engine
        .create_task(project.id, NewTask::new("only").assignee(dev.id), &actor(&manager))
        .unwrap()
        .value;
    engine.start_task(task.id, &actor(&dev)).unwrap();
    engine.complete_task(task.id, &actor(&dev)).unwrap();
    engine.accept_task(task.id, &actor(&manager)).unwrap();
    assert_eq!(engine.project(project.id).unwrap().status, ProjectStatus::Completed);

    // New work drops the percentage but the flip is one-way.
    engine
        .create_task(project.id, NewTask::new("follow-up").assignee(dev.id), &actor(&manager))
        .unwrap();

    let project_after = engine.project(project.id).unwrap();
    assert_eq!(project_after.stats.total_tasks, 2);
    assert_eq!(project_after.stats.completion_percentage, 50);
    assert_eq!(project_after.status, ProjectStatus::Completed);
}

#[test]
fn empty_project_reports_zero_percent() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    let stats = engine.project(project.id).unwrap().stats;
    assert_eq!(stats.total_tasks, 0);
    assert_eq!(stats.completion_percentage, 0);
    assert_eq!(engine.project(project.id).unwrap().status, ProjectStatus::Active);
}

#[test]
fn employee_deletion_is_restricted_while_referenced() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    engine
        .create_task(project.id, NewTask::new("t").assignee(dev.id), &actor(&manager))
        .unwrap();

    // Active assignment blocks deletion.
    let err = engine.delete_employee(dev.id).unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));

    // The manager holds no tasks but still owns the project.
    let err = engine.delete_employee(manager.id).unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));

    // An unreferenced employee deletes cleanly.
    let loner = add_employee(&mut engine, "alex", Role::Member);
    engine.delete_employee(loner.id).unwrap();
    assert!(matches!(engine.employee(loner.id), Err(Error::NotFound(_))));
}

#[test]
fn project_deletion_cascades_and_releases_assignees() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    saturate(&mut engine, project.id, &dev, &manager, 4);
    assert_eq!(engine.employee(dev.id).unwrap().workload, 40);
    let task_id = engine.tasks_for_project(project.id).unwrap()[0].id;

    engine.delete_project(project.id).unwrap();

    assert!(matches!(engine.project(project.id), Err(Error::NotFound(_))));
    assert!(matches!(engine.task(task_id), Err(Error::NotFound(_))));
    assert_eq!(engine.employee(dev.id).unwrap().workload, 0);

    // With no remaining references the former member can now be removed.
    engine.delete_employee(dev.id).unwrap();
}

#[test]
fn availability_reflects_current_load() {
    let mut engine = engine();
    let manager = add_employee(&mut engine, "meredith", Role::Manager);
    let dev = add_employee(&mut engine, "sam", Role::Member);
    let project = add_project(&mut engine, "Apollo", &manager, &[dev.id]);

    assert_eq!(
        engine.availability_status(dev.id).unwrap(),
        Availability::Available
    );

    saturate(&mut engine, project.id, &dev, &manager, 10);
    assert_eq!(
        engine.availability_status(dev.id).unwrap(),
        Availability::Overloaded
    );

    // Accepting one task frees capacity again.
    let task_id = engine.tasks_for_project(project.id).unwrap()[0].id;
    engine.start_task(task_id, &actor(&dev)).unwrap();
    engine.complete_task(task_id, &actor(&dev)).unwrap();
    engine.accept_task(task_id, &actor(&manager)).unwrap();
    assert_eq!(
        engine.availability_status(dev.id).unwrap(),
        Availability::Available
    );
}
