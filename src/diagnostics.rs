//! Per-task liveness and failure-count snapshots.
//!
//! Grounded in the donor's `Statistics`/`TaskInfo` stats-snapshot role, minus
//! the BLE crash-log transport it rode on: only the in-process snapshot
//! struct and its accessor survive here. Tasks call [`record_iteration`] once
//! per loop pass; a caller holding the supervisor's lock folds in the
//! failure-budget counters to build a full [`DiagnosticsSnapshot`].

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One of the engine's long-lived async tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    MeterReader,
    EnergyCheckpoint,
    HourlyCsv,
}

const TASK_COUNT: usize = 3;
const TASK_IDS: [TaskId; TASK_COUNT] = [TaskId::MeterReader, TaskId::EnergyCheckpoint, TaskId::HourlyCsv];

struct TaskCounters {
    is_running: AtomicBool,
    last_iteration_monotonic_ms: AtomicU32,
}

impl TaskCounters {
    const fn new() -> Self {
        Self {
            is_running: AtomicBool::new(false),
            last_iteration_monotonic_ms: AtomicU32::new(0),
        }
    }
}

static TASK_COUNTERS: [TaskCounters; TASK_COUNT] =
    [TaskCounters::new(), TaskCounters::new(), TaskCounters::new()];

fn slot(task: TaskId) -> &'static TaskCounters {
    &TASK_COUNTERS[task as usize]
}

/// Record that `task` just completed a loop iteration at `now_ms`.
///
/// `now_ms` is truncated to 32 bits; a diagnostics timestamp wrapping every
/// ~49 days is an acceptable loss of precision for a liveness indicator.
pub fn record_iteration(task: TaskId, now_ms: u64) {
    let s = slot(task);
    s.is_running.store(true, Ordering::Relaxed);
    s.last_iteration_monotonic_ms.store(now_ms as u32, Ordering::Relaxed);
}

/// Record that `task` has exited its loop and is no longer running.
pub fn record_stopped(task: TaskId) {
    slot(task).is_running.store(false, Ordering::Relaxed);
}

/// Liveness snapshot of a single task.
#[derive(Debug, Clone, Copy)]
pub struct TaskSnapshot {
    pub task: TaskId,
    pub is_running: bool,
    pub last_iteration_monotonic_ms: u32,
}

/// Combined per-task liveness plus the supervisor's windowed failure counts.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub tasks: [TaskSnapshot; TASK_COUNT],
    pub soft_failure_count: u32,
    pub critical_failure_count: u32,
}

/// Collect a full diagnostics snapshot. The caller supplies the supervisor's
/// current counters, since reading them requires holding its lock.
pub fn snapshot(soft_failure_count: u32, critical_failure_count: u32) -> DiagnosticsSnapshot {
    let mut tasks = [TaskSnapshot {
        task: TaskId::MeterReader,
        is_running: false,
        last_iteration_monotonic_ms: 0,
    }; TASK_COUNT];
    for (i, id) in TASK_IDS.into_iter().enumerate() {
        let s = slot(id);
        tasks[i] = TaskSnapshot {
            task: id,
            is_running: s.is_running.load(Ordering::Relaxed),
            last_iteration_monotonic_ms: s.last_iteration_monotonic_ms.load(Ordering::Relaxed),
        };
    }
    DiagnosticsSnapshot { tasks, soft_failure_count, critical_failure_count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes access to the module's statics across the three tests below
    // so they don't observe each other's writes under the default
    // multi-threaded test runner.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn record_iteration_marks_running_and_stamps_time() {
        let _guard = TEST_LOCK.lock().unwrap();
        record_iteration(TaskId::MeterReader, 1234);
        let snap = snapshot(0, 0);
        assert!(snap.tasks[0].is_running);
        assert_eq!(snap.tasks[0].last_iteration_monotonic_ms, 1234);
    }

    #[test]
    fn record_stopped_clears_running_flag() {
        let _guard = TEST_LOCK.lock().unwrap();
        record_iteration(TaskId::HourlyCsv, 10);
        record_stopped(TaskId::HourlyCsv);
        let snap = snapshot(0, 0);
        assert!(!snap.tasks[2].is_running);
    }

    #[test]
    fn snapshot_folds_in_supervisor_counters() {
        let _guard = TEST_LOCK.lock().unwrap();
        let snap = snapshot(3, 1);
        assert_eq!(snap.soft_failure_count, 3);
        assert_eq!(snap.critical_failure_count, 1);
    }
}
