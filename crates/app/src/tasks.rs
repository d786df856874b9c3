//! Background task runner.
//!
//! Every external call (generation, recognition, synthesis, credential work)
//! runs on its own worker thread and reports back over a single mpsc channel
//! that the UI thread drains each frame. At most one task of a given kind is
//! outstanding at a time; a second submission of the same kind is rejected
//! up front with [`Busy`] and the pending task is left alone.
//!
//! Cancelling a kind (or closing the window) bumps a per-kind generation
//! counter. A worker that finishes after that still sends its delivery, but
//! `poll` drops it because the generation no longer matches. Workers never
//! touch UI state directly.

use futures::future::{AbortHandle, AbortRegistration};
use shared::task::{TaskError, TaskKind};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};

/// Successful payload of a finished task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// Assistant reply text.
    Completion(String),
    /// Recognized utterance.
    Recognition(String),
    /// Playback finished; nothing to carry.
    Synthesis,
    /// Credential lookup result: the stored key, if any.
    StoredKey(Option<String>),
    /// Key validated and persisted.
    KeyAccepted { key: String, message: String },
}

/// Exactly one of these arrives per accepted submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub kind: TaskKind,
    pub outcome: Result<TaskOutput, TaskError>,
    generation: u64,
}

/// Submit-time rejection: a task of this kind is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Busy(pub TaskKind);

impl std::fmt::Display for Busy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a {} task is already running", self.0.as_str())
    }
}

pub struct TaskRunner {
    tx: Sender<Delivery>,
    rx: Receiver<Delivery>,
    pending: HashMap<TaskKind, AbortHandle>,
    generations: HashMap<TaskKind, u64>,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRunner {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            pending: HashMap::new(),
            generations: HashMap::new(),
        }
    }

    pub fn is_pending(&self, kind: TaskKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn any_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Spawn `job` on a worker thread. The job gets an [`AbortRegistration`]
    /// it can wrap long-running futures in; jobs that finish quickly may
    /// ignore it, since stale deliveries are dropped at the channel anyway.
    pub fn submit<F>(&mut self, kind: TaskKind, job: F) -> Result<(), Busy>
    where
        F: FnOnce(AbortRegistration) -> Result<TaskOutput, TaskError> + Send + 'static,
    {
        if self.pending.contains_key(&kind) {
            return Err(Busy(kind));
        }

        let generation = *self.generations.entry(kind).or_insert(0);
        let (abort_handle, abort_reg) = AbortHandle::new_pair();
        self.pending.insert(kind, abort_handle);

        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(move || job(abort_reg))) {
                Ok(outcome) => outcome,
                Err(_) => Err(TaskError::Unrecognized(format!(
                    "{} worker panicked",
                    kind.as_str()
                ))),
            };
            // The UI side may already be gone; a dead channel is fine.
            let _ = tx.send(Delivery {
                kind,
                outcome,
                generation,
            });
        });
        Ok(())
    }

    /// Abort the in-flight task of this kind, if any, and invalidate its
    /// delivery. The worker thread is left to run out on its own.
    pub fn cancel(&mut self, kind: TaskKind) {
        if let Some(handle) = self.pending.remove(&kind) {
            handle.abort();
            *self.generations.entry(kind).or_insert(0) += 1;
        }
    }

    /// Window close: nothing in flight may reach the UI afterwards.
    pub fn cancel_all(&mut self) {
        let kinds: Vec<TaskKind> = self.pending.keys().copied().collect();
        for kind in kinds {
            self.cancel(kind);
        }
    }

    /// Drain finished deliveries. Called once per frame; non-blocking.
    /// Deliveries from cancelled generations are discarded here.
    pub fn poll(&mut self) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Ok(delivery) = self.rx.try_recv() {
            let current = self.generations.get(&delivery.kind).copied().unwrap_or(0);
            if delivery.generation != current {
                tracing::debug!(
                    "dropping stale {} delivery (gen {} != {})",
                    delivery.kind.as_str(),
                    delivery.generation,
                    current
                );
                continue;
            }
            self.pending.remove(&delivery.kind);
            out.push(delivery);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn drain_until(runner: &mut TaskRunner, deadline: Duration) -> Vec<Delivery> {
        let start = Instant::now();
        let mut out = Vec::new();
        while start.elapsed() < deadline {
            out.extend(runner.poll());
            if !out.is_empty() && !runner.any_pending() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        out
    }

    #[test]
    fn test_second_submission_of_pending_kind_is_busy() {
        let mut runner = TaskRunner::new();
        runner
            .submit(TaskKind::Completion, |_abort| {
                std::thread::sleep(Duration::from_millis(100));
                Ok(TaskOutput::Completion("first".into()))
            })
            .unwrap();

        let second = runner.submit(TaskKind::Completion, |_abort| {
            Ok(TaskOutput::Completion("second".into()))
        });
        assert_eq!(second, Err(Busy(TaskKind::Completion)));

        // The rejected submission must not disturb the pending one.
        let deliveries = drain_until(&mut runner, Duration::from_secs(2));
        assert_eq!(deliveries.len(), 1);
        assert_eq!(
            deliveries[0].outcome,
            Ok(TaskOutput::Completion("first".into()))
        );
    }

    #[test]
    fn test_different_kinds_run_concurrently() {
        let mut runner = TaskRunner::new();
        runner
            .submit(TaskKind::Completion, |_abort| {
                Ok(TaskOutput::Completion("reply".into()))
            })
            .unwrap();
        runner
            .submit(TaskKind::Synthesis, |_abort| Ok(TaskOutput::Synthesis))
            .unwrap();

        let deliveries = drain_until(&mut runner, Duration::from_secs(2));
        assert_eq!(deliveries.len(), 2);
    }

    #[test]
    fn test_exactly_one_delivery_and_kind_freed_after() {
        let mut runner = TaskRunner::new();
        runner
            .submit(TaskKind::Validation, |_abort| {
                Ok(TaskOutput::StoredKey(None))
            })
            .unwrap();

        let deliveries = drain_until(&mut runner, Duration::from_secs(2));
        assert_eq!(deliveries.len(), 1);
        assert!(!runner.is_pending(TaskKind::Validation));

        // Kind is reusable once delivered.
        assert!(runner
            .submit(TaskKind::Validation, |_abort| Ok(TaskOutput::StoredKey(
                None
            )))
            .is_ok());
    }

    #[test]
    fn test_delivery_after_cancel_is_discarded() {
        let mut runner = TaskRunner::new();
        runner
            .submit(TaskKind::Completion, |_abort| {
                std::thread::sleep(Duration::from_millis(50));
                Ok(TaskOutput::Completion("too late".into()))
            })
            .unwrap();
        runner.cancel(TaskKind::Completion);
        assert!(!runner.is_pending(TaskKind::Completion));

        // Give the worker time to finish and send, then confirm the stale
        // delivery never surfaces.
        std::thread::sleep(Duration::from_millis(200));
        assert!(runner.poll().is_empty());
    }

    #[test]
    fn test_cancel_all_discards_everything_in_flight() {
        let mut runner = TaskRunner::new();
        for kind in [TaskKind::Completion, TaskKind::Recognition] {
            runner
                .submit(kind, move |_abort| {
                    std::thread::sleep(Duration::from_millis(50));
                    Ok(TaskOutput::Synthesis)
                })
                .unwrap();
        }
        runner.cancel_all();
        std::thread::sleep(Duration::from_millis(200));
        assert!(runner.poll().is_empty());
        assert!(!runner.any_pending());
    }

    #[test]
    fn test_panicking_job_still_delivers_a_failure() {
        let mut runner = TaskRunner::new();
        runner
            .submit(TaskKind::Recognition, |_abort| {
                panic!("microphone exploded");
            })
            .unwrap();

        let deliveries = drain_until(&mut runner, Duration::from_secs(2));
        assert_eq!(deliveries.len(), 1);
        assert!(matches!(
            deliveries[0].outcome,
            Err(TaskError::Unrecognized(_))
        ));
        assert!(!runner.is_pending(TaskKind::Recognition));
    }
}
