//! Task lifecycle state rules.
//!
//! States split into two groups. The system-managed states (`Filed`,
//! `Scheduled`, `Doing`) are recomputed from observable facts (schedule
//! entries, due date) every time a task is loaded, read, or mutated. The
//! final states (`Finished`, `Failed`, `Deferred`, `Removed`) are write-once
//! gates a user asserts explicitly; once a task is final, nothing changes its
//! state again, by any path.
//!
//! Everything here is pure: functions take a task and a clock value so the
//! boundary cases are unit-testable without waiting for wall time.

use chrono::{DateTime, Duration, Local, Utc};

use crate::task::{Task, TaskState};

/// Grace period past the due date before a task auto-fails.
///
/// The check is a strict greater-than on `due + 24h`, not a calendar-day
/// difference.
pub const OVERDUE_GRACE_HOURS: i64 = 24;

/// One estimation work unit, in minutes. Points are Fibonacci buckets of
/// these units.
pub const WORK_UNIT_MINUTES: f64 = 20.0;

/// The four states a user may set directly, always offered as a fixed set.
pub const USER_SETTABLE_STATES: [TaskState; 4] = [
    TaskState::Finished,
    TaskState::Failed,
    TaskState::Deferred,
    TaskState::Removed,
];

/// Compute the state a task should be in right now.
pub fn calculate_state(task: &Task) -> TaskState {
    calculate_state_at(task, Utc::now())
}

/// Compute the state a task should be in at `now`.
///
/// Rule order matters: finality is sticky, the overdue check precedes the
/// scheduled-today check, and "scheduled today" looks at `start_time` only
/// (local calendar date, start-of-day inclusive to start-of-next-day
/// exclusive).
pub fn calculate_state_at(task: &Task, now: DateTime<Utc>) -> TaskState {
    if task.state.is_final() {
        return task.state;
    }

    if let Some(due) = task.due_date_time {
        if now > due + Duration::hours(OVERDUE_GRACE_HOURS) {
            return TaskState::Failed;
        }
    }

    let today = now.with_timezone(&Local).date_naive();
    let scheduled_today = task
        .schedule_history
        .iter()
        .any(|entry| entry.start_time.with_timezone(&Local).date_naive() == today);
    if scheduled_today {
        return TaskState::Doing;
    }

    if !task.schedule_history.is_empty() {
        return TaskState::Scheduled;
    }

    TaskState::Filed
}

/// Normalize a task's state in place. Returns whether the state changed.
///
/// Idempotent: a second call immediately after the first is a no-op.
pub fn apply_rules(task: &mut Task) -> bool {
    apply_rules_at(task, Utc::now())
}

/// Normalize a task's state in place against an explicit clock.
pub fn apply_rules_at(task: &mut Task, now: DateTime<Utc>) -> bool {
    let computed = calculate_state_at(task, now);
    if computed != task.state {
        tracing::debug!(
            task_id = %task.id,
            from = %task.state,
            to = %computed,
            "task state normalized"
        );
        task.state = computed;
        true
    } else {
        false
    }
}

/// Whether a user may explicitly move a task from `current` to `requested`.
///
/// Only the four final states can be requested, and never from a state that
/// is already final (final-to-final is rejected even for the same state).
pub fn can_user_set_state(current: TaskState, requested: TaskState) -> bool {
    requested.is_final() && !current.is_final()
}

/// States a user may currently set on this task.
pub fn available_user_states(task: &Task) -> Vec<TaskState> {
    if task.state.is_final() {
        Vec::new()
    } else {
        USER_SETTABLE_STATES.to_vec()
    }
}

/// Map an estimated time in minutes to story points.
///
/// The estimate is converted to 20-minute work units and bucketed into the
/// smallest Fibonacci number (1, 2, 3, 5, 8, 13, ...) that covers it.
/// Missing or zero estimates score zero.
pub fn fibonacci_points(estimated_time: Option<u32>) -> u32 {
    let minutes = match estimated_time {
        Some(minutes) if minutes > 0 => minutes,
        _ => return 0,
    };

    let units = f64::from(minutes) / WORK_UNIT_MINUTES;
    let mut bucket: u32 = 1;
    let mut next: u32 = 2;
    while f64::from(bucket) < units {
        let sum = bucket + next;
        bucket = next;
        next = sum;
    }
    bucket
}
