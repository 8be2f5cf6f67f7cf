//! Bounded fan-out / fan-in.
//!
//! [`TaskAggregator::run`] starts one blocking task per input, never more
//! than `max_in_flight` at once, and waits until every task has reported.
//! Each task reports exactly one slot: its value, its error, or its panic.
//! The slots are merged into a [`FanIn`] so no caller counts results by hand.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

use crate::error::{AggregateError, TaskFailure};
use crate::reconciler::Phase;

/// Everything one fan-out produced.
#[derive(Debug)]
pub struct FanIn<T> {
    /// Number of tasks that were handed to the aggregator.
    pub expected: usize,
    /// Successful values, in completion order.
    pub completed: Vec<T>,
    /// Failures, in completion order.
    pub failures: Vec<TaskFailure>,
}

impl<T> FanIn<T> {
    /// Slots consumed; equals `expected` once `run` returns.
    pub fn reported(&self) -> usize {
        self.completed.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The successful values, or every failure merged under `phase`.
    pub fn into_result(self, phase: Phase) -> Result<Vec<T>, AggregateError> {
        if self.failures.is_empty() {
            return Ok(self.completed);
        }
        Err(AggregateError {
            phase,
            failures: self.failures,
            succeeded: self.completed.len(),
        })
    }
}

/// Runs independent blocking operations concurrently under a fixed bound.
#[derive(Debug, Clone)]
pub struct TaskAggregator {
    max_in_flight: NonZeroUsize,
}

impl TaskAggregator {
    pub fn new(max_in_flight: NonZeroUsize) -> Self {
        Self { max_in_flight }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.get()
    }

    /// Run `op` once per input and wait for all of them.
    ///
    /// Each input is labelled; the label names the task in its failure. The
    /// returned [`FanIn`] always holds exactly `inputs.len()` slots.
    pub async fn run<A, T, E, F>(&self, inputs: Vec<(String, A)>, op: F) -> FanIn<T>
    where
        A: Send + 'static,
        T: Send + 'static,
        E: Display,
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
    {
        let expected = inputs.len();
        let op = Arc::new(op);
        let permits = Arc::new(Semaphore::new(self.max_in_flight.get()));
        let mut set = JoinSet::new();
        let mut completed = Vec::with_capacity(expected);
        let mut failures = Vec::new();

        // Labels are keyed by task id so a task that never returns its own
        // result still names its input.
        let mut labels: HashMap<task::Id, String> = HashMap::with_capacity(expected);

        for (label, input) in inputs {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(closed) => {
                    failures.push(TaskFailure::new(label, closed));
                    continue;
                }
            };
            let op = Arc::clone(&op);
            let handle = set.spawn_blocking(move || {
                let _permit = permit;
                match catch_unwind(AssertUnwindSafe(|| (*op)(input))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(payload) => Err(format!("task panicked: {}", panic_message(&*payload))),
                }
            });
            labels.insert(handle.id(), label);
        }

        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, Ok(value))) => {
                    labels.remove(&id);
                    completed.push(value);
                }
                Ok((id, Err(message))) => {
                    let task = take_label(&mut labels, id);
                    tracing::warn!(task = %task, error = %message, "task failed");
                    failures.push(TaskFailure { task, message });
                }
                Err(join_err) => {
                    let task = take_label(&mut labels, join_err.id());
                    tracing::warn!(task = %task, error = %join_err, "task did not report");
                    failures.push(TaskFailure::new(task, join_err));
                }
            }
        }

        let fan_in = FanIn {
            expected,
            completed,
            failures,
        };
        debug_assert_eq!(fan_in.reported(), expected);
        fan_in
    }
}

fn take_label(labels: &mut HashMap<task::Id, String>, id: task::Id) -> String {
    labels
        .remove(&id)
        .unwrap_or_else(|| format!("<task {id}>"))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    fn aggregator(limit: usize) -> TaskAggregator {
        TaskAggregator::new(NonZeroUsize::new(limit).expect("non-zero"))
    }

    fn labelled(n: usize) -> Vec<(String, usize)> {
        (0..n).map(|i| (format!("task-{i}"), i)).collect()
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(1, 1)]
    #[case(10, 0)]
    #[case(10, 3)]
    #[case(10, 10)]
    #[case(200, 57)]
    #[tokio::test(flavor = "multi_thread")]
    async fn consumes_exactly_n_slots(#[case] n: usize, #[case] k: usize) {
        let fan_in = aggregator(4)
            .run(labelled(n), move |i| {
                if i < k {
                    Err(format!("fail {i}"))
                } else {
                    Ok(i)
                }
            })
            .await;

        assert_eq!(fan_in.expected, n);
        assert_eq!(fan_in.reported(), n);
        assert_eq!(fan_in.failures.len(), k);
        assert_eq!(fan_in.completed.len(), n - k);
        assert_eq!(fan_in.is_success(), k == 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn every_failure_is_kept_once() {
        let fan_in = aggregator(3)
            .run(labelled(6), |i| if i % 2 == 0 { Err("even") } else { Ok(i) })
            .await;

        let mut tasks: Vec<_> = fan_in.failures.iter().map(|f| f.task.clone()).collect();
        tasks.sort();
        assert_eq!(tasks, vec!["task-0", "task-2", "task-4"]);
        assert!(fan_in.failures.iter().all(|f| f.message == "even"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_task_reports_exactly_one_failure() {
        let fan_in = aggregator(2)
            .run(labelled(5), |i| {
                if i == 1 || i == 3 {
                    panic!("exploded on {i}");
                }
                Ok::<_, String>(i)
            })
            .await;

        assert_eq!(fan_in.reported(), 5);
        assert_eq!(fan_in.failures.len(), 2);
        assert!(fan_in
            .failures
            .iter()
            .all(|f| f.message.starts_with("task panicked: exploded on")));
    }

    struct PanicsWhenDropped;

    impl Drop for PanicsWhenDropped {
        fn drop(&mut self) {
            panic!("payload dropped");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn task_lost_to_join_error_keeps_its_label() {
        let inputs = vec![("I_kept".to_owned(), false), ("I_lost".to_owned(), true)];
        let fan_in = aggregator(2)
            .run(inputs, |explode| {
                if explode {
                    std::panic::panic_any(PanicsWhenDropped);
                }
                Ok::<_, String>(())
            })
            .await;

        assert_eq!(fan_in.reported(), 2);
        assert_eq!(fan_in.completed.len(), 1);
        assert_eq!(fan_in.failures.len(), 1);
        assert_eq!(fan_in.failures[0].task, "I_lost");
        assert!(
            fan_in.failures[0].message.contains("payload dropped"),
            "got: {}",
            fan_in.failures[0].message
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_flight_never_exceeds_the_bound() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (c, p) = (current.clone(), peak.clone());

        let fan_in = aggregator(3)
            .run(labelled(20), move |i| {
                let now = c.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                c.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(i)
            })
            .await;

        assert_eq!(fan_in.completed.len(), 20);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in flight was {peak}");
        assert!(peak >= 2, "tasks never overlapped");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn into_result_merges_failures_under_phase() {
        let err = aggregator(2)
            .run(labelled(4), |i| if i == 0 { Err("nope") } else { Ok(i) })
            .await
            .into_result(Phase::Creating)
            .unwrap_err();

        assert_eq!(err.phase, Phase::Creating);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.succeeded, 3);
    }
}
