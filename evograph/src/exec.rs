//! The execution layer: a bounded worker-thread pool plus
//! task-group join barriers.
//!
//! Units of work are submitted fire-and-forget; a [`TaskGroup`]
//! created per batch acts as the join barrier. Tasks register
//! against the group on submission and signal completion on
//! return, so the submitter can block until the whole batch has
//! drained without tracking individual futures. Tasks within a
//! group have no ordering guarantee relative to each other.
//!
//! Failures are not thrown on the worker thread: each task
//! returns a `Result` (and panics are caught and converted), the
//! group records the first failure, and the orchestrating thread
//! re-raises it exactly once at its next synchronization point —
//! [`TaskGroup::check`] or [`TaskGroup::wait`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// The boxed error type worker tasks report.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Job = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

#[derive(Debug)]
struct PoolClosed;

impl std::fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task submitted to a shut-down pool")
    }
}

impl std::error::Error for PoolClosed {}

struct GroupInner {
    outstanding: Mutex<usize>,
    drained: Condvar,
    failure: Mutex<Option<TaskError>>,
}

/// A join barrier over a batch of concurrently submitted tasks.
///
/// # Examples
/// ```
/// use evograph::exec::{TaskGroup, TaskPool};
///
/// let pool = TaskPool::new(4);
/// let group = TaskGroup::new();
/// for _ in 0..8 {
///     pool.process(&group, || Ok(())).unwrap();
/// }
/// group.wait().unwrap();
/// ```
#[derive(Clone)]
pub struct TaskGroup {
    inner: Arc<GroupInner>,
}

impl TaskGroup {
    /// Creates an empty group.
    pub fn new() -> TaskGroup {
        TaskGroup {
            inner: Arc::new(GroupInner {
                outstanding: Mutex::new(0),
                drained: Condvar::new(),
                failure: Mutex::new(None),
            }),
        }
    }

    fn register(&self) {
        *self.inner.outstanding.lock().unwrap() += 1;
    }

    fn complete(&self) {
        let mut outstanding = self.inner.outstanding.lock().unwrap();
        *outstanding -= 1;
        if *outstanding == 0 {
            self.inner.drained.notify_all();
        }
    }

    fn record_failure(&self, error: TaskError) {
        let mut failure = self.inner.failure.lock().unwrap();
        // First failure wins; later ones in the batch are dropped.
        if failure.is_none() {
            *failure = Some(error);
        }
    }

    /// Returns the number of tasks submitted but not yet completed.
    pub fn outstanding(&self) -> usize {
        *self.inner.outstanding.lock().unwrap()
    }

    /// Surfaces a recorded worker failure, clearing the slot so
    /// the failure is raised exactly once.
    ///
    /// # Errors
    ///
    /// Returns the first failure recorded by any task in the
    /// group since the last check.
    pub fn check(&self) -> Result<(), TaskError> {
        match self.inner.failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Blocks until every task in the group has completed, then
    /// surfaces any recorded failure as [`check`] does.
    ///
    /// [`check`]: TaskGroup::check
    pub fn wait(&self) -> Result<(), TaskError> {
        let mut outstanding = self.inner.outstanding.lock().unwrap();
        while *outstanding > 0 {
            outstanding = self.inner.drained.wait(outstanding).unwrap();
        }
        drop(outstanding);
        self.check()
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts live workers so shutdown can wait for them with a
/// timeout instead of joining handles.
struct Liveness {
    alive: Mutex<usize>,
    idle: Condvar,
}

/// A bounded worker-thread pool executing fire-and-forget tasks.
///
/// Workers park on a shared channel; dropping the pool's sender
/// lets them finish queued work and exit. [`shutdown`] waits for
/// that to happen up to a timeout and abandons stragglers, after
/// which the pool is consumed and cannot be reused.
///
/// [`shutdown`]: TaskPool::shutdown
pub struct TaskPool {
    sender: Option<Sender<(Job, TaskGroup)>>,
    liveness: Arc<Liveness>,
    threads: usize,
}

impl TaskPool {
    /// Creates a pool with the given number of worker threads
    /// (at least one).
    pub fn new(threads: usize) -> TaskPool {
        let threads = threads.max(1);
        let (sender, receiver) = channel::<(Job, TaskGroup)>();
        let receiver = Arc::new(Mutex::new(receiver));
        let liveness = Arc::new(Liveness {
            alive: Mutex::new(threads),
            idle: Condvar::new(),
        });

        for _ in 0..threads {
            let receiver = Arc::clone(&receiver);
            let liveness = Arc::clone(&liveness);
            // Workers are detached; shutdown tracks them through
            // the liveness count instead of join handles.
            let _ = thread::spawn(move || {
                loop {
                    let message = { receiver.lock().unwrap().recv() };
                    let (job, group) = match message {
                        Ok(message) => message,
                        // Channel closed: the pool is shutting down.
                        Err(_) => break,
                    };

                    let outcome = match catch_unwind(AssertUnwindSafe(job)) {
                        Ok(outcome) => outcome,
                        Err(panic) => Err(panic_message(panic).into()),
                    };
                    if let Err(error) = outcome {
                        group.record_failure(error);
                    }
                    group.complete();
                }

                let mut alive = liveness.alive.lock().unwrap();
                *alive -= 1;
                if *alive == 0 {
                    liveness.idle.notify_all();
                }
            });
        }

        TaskPool {
            sender: Some(sender),
            liveness,
            threads,
        }
    }

    /// Creates a pool sized to the machine's available
    /// parallelism — in practice unbounded for the population
    /// sizes this engine runs.
    pub fn with_default_size() -> TaskPool {
        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        TaskPool::new(threads)
    }

    /// Returns the number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.threads
    }

    /// Submits a task against the group. The task is registered
    /// with the group before it is queued, so a subsequent
    /// [`TaskGroup::wait`] cannot miss it.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool has been shut down.
    pub fn process<F>(&self, group: &TaskGroup, job: F) -> Result<(), TaskError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return Err(PoolClosed.into()),
        };
        group.register();
        if sender.send((Box::new(job), group.clone())).is_err() {
            group.complete();
            return Err(PoolClosed.into());
        }
        Ok(())
    }

    /// Shuts the pool down: the queue is closed, in-flight and
    /// queued tasks may finish until `timeout` elapses, and any
    /// stragglers are abandoned. Returns whether every worker
    /// exited in time. The pool is consumed either way.
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        self.sender.take();

        let deadline = Instant::now() + timeout;
        let mut alive = self.liveness.alive.lock().unwrap();
        while *alive > 0 {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => return false,
            };
            let (guard, result) = self.liveness.idle.wait_timeout(alive, remaining).unwrap();
            alive = guard;
            if result.timed_out() && *alive > 0 {
                return false;
            }
        }
        true
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("worker task panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("worker task panicked: {}", message)
    } else {
        String::from("worker task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn group_waits_for_all_tasks() {
        let pool = TaskPool::new(4);
        let group = TaskGroup::new();
        let completed = Arc::new(AtomicUsize::new(0));

        const TASKS: usize = 32;
        for _ in 0..TASKS {
            let completed = Arc::clone(&completed);
            pool.process(&group, move || {
                thread::sleep(Duration::from_millis(2));
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }

        group.wait().unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), TASKS);
        assert_eq!(group.outstanding(), 0);
    }

    #[test]
    fn failure_surfaces_exactly_once() {
        let pool = TaskPool::new(4);
        let group = TaskGroup::new();

        for i in 0..16 {
            pool.process(&group, move || {
                if i == 7 {
                    Err("task 7 broke".into())
                } else {
                    Ok(())
                }
            })
            .unwrap();
        }

        let error = group.wait().unwrap_err();
        assert!(error.to_string().contains("task 7 broke"));
        // The slot is cleared after the first raise.
        assert!(group.check().is_ok());
    }

    #[test]
    fn panics_are_captured_as_failures() {
        let pool = TaskPool::new(2);
        let group = TaskGroup::new();

        pool.process(&group, || panic!("boom")).unwrap();

        let error = group.wait().unwrap_err();
        assert!(error.to_string().contains("boom"));
    }

    #[test]
    fn shutdown_drains_queued_work() {
        let pool = TaskPool::new(2);
        let group = TaskGroup::new();
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let completed = Arc::clone(&completed);
            pool.process(&group, move || {
                thread::sleep(Duration::from_millis(1));
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }

        assert!(pool.shutdown(Duration::from_secs(5)));
        assert_eq!(completed.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn shutdown_times_out_on_stuck_workers() {
        let pool = TaskPool::new(1);
        let group = TaskGroup::new();

        pool.process(&group, || {
            thread::sleep(Duration::from_secs(60));
            Ok(())
        })
        .unwrap();
        // Give the worker time to pick the task up.
        thread::sleep(Duration::from_millis(20));

        assert!(!pool.shutdown(Duration::from_millis(50)));
    }
}
