//! Scoring model, workload calculator, and the availability policy that
//! gates assignment.
//!
//! Everything here is pure: no storage, no clock. The engine evaluates
//! these inside the same transaction as the mutation they gate, so
//! eligibility is never judged against stale state.

use serde::{Deserialize, Serialize};

/// Performance floor. At or above it an employee is considered available.
pub const MIN_PERFORMANCE: i32 = 40;
/// Performance ceiling.
pub const MAX_PERFORMANCE: i32 = 100;
/// How far one review outcome moves the score, in either direction.
pub const PERFORMANCE_STEP: i32 = 5;
/// Active tasks at which workload reads 100%.
pub const TASKS_PER_WORKLOAD_UNIT: i64 = 10;
/// Workload at or above which no new work may be assigned.
pub const MAX_WORKLOAD: i32 = 100;

/// Apply one review outcome to a performance score.
///
/// Accepted work recovers the score, rejected work decays it; the result
/// is always clamped to `MIN_PERFORMANCE..=MAX_PERFORMANCE`.
pub fn adjust_performance(current: i32, accepted: bool) -> i32 {
    if accepted {
        (current + PERFORMANCE_STEP).min(MAX_PERFORMANCE)
    } else {
        (current - PERFORMANCE_STEP).max(MIN_PERFORMANCE)
    }
}

/// Performance at or above the floor.
pub fn is_available(performance: i32) -> bool {
    performance >= MIN_PERFORMANCE
}

/// Workload percentage for a given active task count.
/// Always derived from the current count, never incrementally adjusted.
pub fn compute_workload(active_task_count: i64) -> i32 {
    (active_task_count * 100 / TASKS_PER_WORKLOAD_UNIT) as i32
}

/// At or over capacity.
pub fn is_overloaded(workload: i32) -> bool {
    workload >= MAX_WORKLOAD
}

/// Which eligibility gate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Performance below the floor.
    Performance,
    /// Workload at capacity.
    Workload,
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Gate::Performance => "performance below required threshold",
            Gate::Workload => "workload at capacity",
        };
        write!(f, "{s}")
    }
}

/// The composite assignment gate: available AND not overloaded.
/// On failure, names the first gate that tripped.
pub fn can_assign(performance: i32, workload: i32) -> Result<(), Gate> {
    if !is_available(performance) {
        return Err(Gate::Performance);
    }
    if is_overloaded(workload) {
        return Err(Gate::Workload);
    }
    Ok(())
}

/// Human-facing availability summary for an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    LowPerformance,
    Overloaded,
}

impl Availability {
    pub fn of(performance: i32, workload: i32) -> Self {
        match can_assign(performance, workload) {
            Ok(()) => Availability::Available,
            Err(Gate::Performance) => Availability::LowPerformance,
            Err(Gate::Workload) => Availability::Overloaded,
        }
    }

    /// Display color for dashboards.
    pub fn color(self) -> &'static str {
        match self {
            Availability::Available => "#00FF00",
            Availability::LowPerformance => "#FFA500",
            Availability::Overloaded => "#FFFF00",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Availability::Available => "Available",
            Availability::LowPerformance => "Low Performance",
            Availability::Overloaded => "Overloaded",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptance_recovers_capped_at_ceiling() {
        assert_eq!(adjust_performance(90, true), 95);
        assert_eq!(adjust_performance(98, true), 100);
        assert_eq!(adjust_performance(100, true), 100);
    }

    #[test]
    fn rejection_decays_floored_at_minimum() {
        assert_eq!(adjust_performance(50, false), 45);
        assert_eq!(adjust_performance(42, false), 40);
        assert_eq!(adjust_performance(40, false), 40);
    }

    #[test]
    fn performance_stays_clamped_under_arbitrary_outcomes() {
        let mut score = 100;
        for accepted in [false, false, true, false, true, true, false, false, false] {
            score = adjust_performance(score, accepted);
            assert!((MIN_PERFORMANCE..=MAX_PERFORMANCE).contains(&score));
        }

        // Twelve consecutive rejections floor at 40, never below.
        let mut score = 100;
        for _ in 0..12 {
            score = adjust_performance(score, false);
        }
        assert_eq!(score, MIN_PERFORMANCE);
    }

    #[test]
    fn workload_endpoints_and_monotonicity() {
        assert_eq!(compute_workload(0), 0);
        assert_eq!(compute_workload(10), 100);

        let mut prev = compute_workload(0);
        for count in 1..=15 {
            let next = compute_workload(count);
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn can_assign_truth_table() {
        assert_eq!(can_assign(100, 0), Ok(()));
        assert_eq!(can_assign(40, 90), Ok(()));
        assert_eq!(can_assign(39, 0), Err(Gate::Performance));
        assert_eq!(can_assign(100, 100), Err(Gate::Workload));
        // Performance gate is checked first when both fail.
        assert_eq!(can_assign(35, 100), Err(Gate::Performance));
    }

    #[test]
    fn availability_summary_matches_gates() {
        assert_eq!(Availability::of(100, 50), Availability::Available);
        assert_eq!(Availability::of(35, 0), Availability::LowPerformance);
        assert_eq!(Availability::of(80, 100), Availability::Overloaded);
    }

    #[test]
    fn each_availability_state_has_a_distinct_badge_color() {
        let colors = [
            Availability::Available.color(),
            Availability::LowPerformance.color(),
            Availability::Overloaded.color(),
        ];
        for color in colors {
            assert!(color.starts_with('#') && color.len() == 7);
        }
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        assert_ne!(colors[0], colors[2]);
    }
}
