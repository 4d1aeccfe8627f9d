//! Sequential execution unit
//!
//! Each actor owns exactly one [`ExecutionUnit`]: a dedicated OS thread that
//! drains a FIFO queue of tasks, running them one at a time. Anything may
//! enqueue from any thread; nothing waits for the task to finish.
//!
//! Lifecycle:
//!
//! ```text
//! Running --stop(Drain)--> Draining --queue empty--> Stopped
//! Running --stop(Halt)---> Halting  --discard------> Stopped
//! ```

use super::supervisor::{panic_message, FaultPolicy};
use crate::error::{BusError, Result};
use crate::observer::Observer;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Deferred unit of work run on an actor's worker
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// How an execution unit treats queued tasks when it is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownMode {
    /// Run everything already queued, then stop
    #[default]
    Drain,

    /// Drop everything not yet started, then stop
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Running,
    Draining,
    Halting,
    Stopped,
}

#[derive(Debug, Clone, Default)]
pub struct UnitOptions {
    pub teardown: TeardownMode,
    pub fault_policy: FaultPolicy,
    /// OS thread name, defaults to the unit name
    pub thread_name: Option<String>,
}

struct Queue {
    tasks: VecDeque<Task>,
    state: UnitState,
}

struct Shared {
    name: String,
    queue: Mutex<Queue>,
    wake: Condvar,
    executed: AtomicU64,
}

pub struct ExecutionUnit {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: ThreadId,
    teardown: TeardownMode,
}

impl ExecutionUnit {
    /// Start the worker thread
    pub fn spawn(
        name: impl Into<String>,
        options: UnitOptions,
        observer: Arc<dyn Observer>,
    ) -> Result<Self> {
        let name = name.into();
        let thread_name = options.thread_name.unwrap_or_else(|| name.clone());
        // The OS thread builder panics on interior NUL bytes
        if thread_name.contains('\0') {
            return Err(BusError::InvalidName(thread_name));
        }

        let shared = Arc::new(Shared {
            name: name.clone(),
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                state: UnitState::Running,
            }),
            wake: Condvar::new(),
            executed: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let policy = options.fault_policy;
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_worker(worker_shared, policy, observer))?;
        let worker_thread = handle.thread().id();

        tracing::debug!(unit = %name, ?policy, "Execution unit started");

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
            worker_thread,
            teardown: options.teardown,
        })
    }

    /// Append a task to the queue and wake the worker
    pub fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut queue = self.shared.queue.lock();
            if queue.state != UnitState::Running {
                return Err(BusError::UnitStopped(self.shared.name.clone()));
            }
            queue.tasks.push_back(Box::new(task));
        }

        self.shared.wake.notify_one();
        Ok(())
    }

    /// Leave the running state and wait for the worker to exit
    ///
    /// Only the first call picks the mode. Called from the unit's own worker
    /// (the owner was dropped inside one of its tasks) the thread is detached
    /// instead of joined.
    pub fn stop(&self, mode: TeardownMode) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.state == UnitState::Running {
                queue.state = match mode {
                    TeardownMode::Drain => UnitState::Draining,
                    TeardownMode::Halt => UnitState::Halting,
                };
            }
        }
        self.shared.wake.notify_all();

        let Some(handle) = self.worker.lock().take() else {
            return;
        };

        if thread::current().id() == self.worker_thread {
            tracing::debug!(unit = %self.shared.name, "Execution unit stopped from its own worker, detaching");
            return;
        }

        if handle.join().is_err() {
            tracing::error!(unit = %self.shared.name, "Execution unit worker exited abnormally");
        }
    }

    /// Block until every task queued before this call has run
    ///
    /// Returns `Ok(false)` on timeout, or immediately when called from the
    /// unit's own worker since that would wait on itself.
    pub fn flush(&self, timeout: Duration) -> Result<bool> {
        if self.is_worker_thread() {
            return Ok(false);
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.enqueue(move || {
            let _ = tx.send(());
        })?;
        Ok(rx.recv_timeout(timeout).is_ok())
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> UnitState {
        self.shared.queue.lock().state
    }

    /// Tasks queued but not started
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Tasks run to completion or to a caught panic
    ///
    /// The count is bumped after a task returns, so it lags whatever the
    /// running task has just signalled, including a [`flush`](Self::flush)
    /// marker.
    pub fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Acquire)
    }

    pub fn teardown_mode(&self) -> TeardownMode {
        self.teardown
    }

    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_thread
    }
}

impl Drop for ExecutionUnit {
    fn drop(&mut self) {
        self.stop(self.teardown);
    }
}

impl std::fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

fn run_worker(shared: Arc<Shared>, policy: FaultPolicy, observer: Arc<dyn Observer>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            while queue.tasks.is_empty() && queue.state == UnitState::Running {
                shared.wake.wait(&mut queue);
            }

            match queue.state {
                UnitState::Halting => {
                    let discarded = std::mem::take(&mut queue.tasks);
                    drop(queue);
                    if !discarded.is_empty() {
                        tracing::debug!(unit = %shared.name, discarded = discarded.len(), "Discarding queued tasks");
                    }
                    break;
                }
                UnitState::Draining if queue.tasks.is_empty() => break,
                _ => {}
            }

            match queue.tasks.pop_front() {
                Some(task) => task,
                None => continue,
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(task));
        shared.executed.fetch_add(1, Ordering::AcqRel);

        if let Err(payload) = outcome {
            let reason = panic_message(payload.as_ref());
            observer.worker_fault(&shared.name, &reason);

            if policy == FaultPolicy::Escalate {
                let discarded = {
                    let mut queue = shared.queue.lock();
                    queue.state = UnitState::Halting;
                    std::mem::take(&mut queue.tasks)
                };
                tracing::warn!(
                    unit = %shared.name,
                    discarded = discarded.len(),
                    "Halting execution unit after task panic"
                );
                drop(discarded);
                break;
            }
        }
    }

    shared.queue.lock().state = UnitState::Stopped;
    tracing::debug!(unit = %shared.name, "Execution unit stopped");
}
