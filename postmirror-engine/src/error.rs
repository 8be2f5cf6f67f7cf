//! Error types for postmirror-engine.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::reconciler::Phase;

/// One task's failure, as reported into its phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    /// What the task was working on (a record id, a document title, ...).
    pub task: String,
    pub message: String,
}

impl TaskFailure {
    pub fn new(task: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            task: task.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.message)
    }
}

/// Every failure of one phase, merged. Never empty.
///
/// `succeeded` counts the tasks of the same phase whose side effects already
/// happened; they are not undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error(
    "{phase} failed ({} of {} tasks): {}",
    failed_count(.failures),
    task_count(.failures, .succeeded),
    join_failures(.failures)
)]
pub struct AggregateError {
    pub phase: Phase,
    pub failures: Vec<TaskFailure>,
    pub succeeded: usize,
}

impl AggregateError {
    /// A phase that failed as a whole rather than per task.
    pub fn single(phase: Phase, failure: TaskFailure) -> Self {
        Self {
            phase,
            failures: vec![failure],
            succeeded: 0,
        }
    }
}

fn failed_count(failures: &[TaskFailure]) -> usize {
    failures.len()
}

fn task_count(failures: &[TaskFailure], succeeded: &usize) -> usize {
    failures.len() + succeeded
}

fn join_failures(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(TaskFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
