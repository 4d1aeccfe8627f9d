//! Request deadlines
//!
//! Requests sent with a timeout are tracked here until a response passes
//! through the bus. One background thread per bus sleeps until the earliest
//! deadline and hands expired requests back to the bus, which tells the
//! requester its request was abandoned. Ids of abandoned requests are kept
//! for a few multiples of their timeout so a response that shows up late can
//! be recognised and dropped.

use crate::bus::{BusInner, MessageBus};
use crate::envelope::{Envelope, MessageId};
use crate::error::Result;
use crate::topics::PairId;
use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Abandoned ids are remembered for this many multiples of their timeout
const RETAIN_FACTOR: u32 = 4;

/// Lower bound on how long an abandoned id is remembered
const MIN_RETAIN: Duration = Duration::from_secs(1);

/// What the bus should do with a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    /// The request was tracked with this timeout and is now answered
    Answered(Duration),
    /// The request already timed out, the response is late
    Abandoned,
    /// The request was sent without a deadline
    Untracked,
}

struct Pending {
    pair: PairId,
    request: Envelope,
    timeout: Duration,
    generation: u64,
}

#[derive(Default)]
struct Table {
    pending: HashMap<MessageId, Pending>,
    /// Expiry of each armed request; entries from older generations are skipped
    deadlines: BinaryHeap<Reverse<(Instant, MessageId, u64)>>,
    /// Abandoned ids and when they may be forgotten
    abandoned: HashMap<MessageId, Instant>,
    forget: BinaryHeap<Reverse<(Instant, MessageId)>>,
    generation: u64,
    shutdown: bool,
}

impl Table {
    fn next_wake(&self) -> Option<Instant> {
        let deadline = self.deadlines.peek().map(|Reverse((at, _, _))| *at);
        let forget = self.forget.peek().map(|Reverse((at, _))| *at);
        match (deadline, forget) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn retire(&mut self, id: MessageId, timeout: Duration, now: Instant) {
        let retain = timeout
            .checked_mul(RETAIN_FACTOR)
            .unwrap_or(timeout)
            .max(MIN_RETAIN);
        let Some(until) = now.checked_add(retain) else {
            return;
        };
        self.abandoned.insert(id, until);
        self.forget.push(Reverse((until, id)));
    }

    /// Pop everything due at `now`, returning the requests that expired
    fn expire(&mut self, now: Instant) -> Vec<Pending> {
        let mut expired = Vec::new();
        while let Some(Reverse((at, id, generation))) = self.deadlines.peek().copied() {
            if at > now {
                break;
            }
            self.deadlines.pop();
            // Answered or re-armed requests leave their old heap entry behind
            if self.pending.get(&id).map(|p| p.generation) != Some(generation) {
                continue;
            }
            if let Some(pending) = self.pending.remove(&id) {
                self.retire(id, pending.timeout, now);
                expired.push(pending);
            }
        }

        while let Some(Reverse((at, id))) = self.forget.peek().copied() {
            if at > now {
                break;
            }
            self.forget.pop();
            if self.abandoned.get(&id).is_some_and(|until| *until <= now) {
                self.abandoned.remove(&id);
            }
        }
        expired
    }
}

#[derive(Default)]
struct WatchState {
    table: Mutex<Table>,
    wake: Condvar,
}

pub(crate) struct DeadlineWatcher {
    state: Arc<WatchState>,
    worker: Mutex<Option<JoinHandle<()>>>,
    thread_name: String,
}

impl DeadlineWatcher {
    pub(crate) fn new(thread_name: String) -> Self {
        Self {
            state: Arc::new(WatchState::default()),
            worker: Mutex::new(None),
            thread_name,
        }
    }

    /// Start tracking `request`, spawning the watcher thread on first use
    ///
    /// Re-arming an id that is still pending replaces its deadline. A
    /// re-sent request that was already abandoned is tracked afresh.
    pub(crate) fn arm(
        &self,
        bus: Weak<BusInner>,
        pair: PairId,
        request: Envelope,
        timeout: Duration,
    ) -> Result<()> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            tracing::debug!(%pair, ?timeout, "Timeout out of range, request left untracked");
            return Ok(());
        };
        self.ensure_started(bus)?;

        {
            let mut table = self.state.table.lock();
            let id = request.id();
            table.generation += 1;
            let generation = table.generation;
            table.abandoned.remove(&id);
            table.deadlines.push(Reverse((deadline, id, generation)));
            table.pending.insert(
                id,
                Pending {
                    pair,
                    request,
                    timeout,
                    generation,
                },
            );
        }
        self.state.wake.notify_one();
        Ok(())
    }

    /// Settle a request id when its response passes through the bus
    pub(crate) fn complete(&self, id: MessageId) -> Completion {
        let mut table = self.state.table.lock();
        if let Some(pending) = table.pending.remove(&id) {
            Completion::Answered(pending.timeout)
        } else if table.abandoned.remove(&id).is_some() {
            Completion::Abandoned
        } else {
            Completion::Untracked
        }
    }

    /// Treat an answered id as abandoned so any later response counts as late
    pub(crate) fn retire(&self, id: MessageId, timeout: Duration) {
        self.state
            .table
            .lock()
            .retire(id, timeout, Instant::now());
        self.state.wake.notify_one();
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.state.table.lock().pending.len()
    }

    /// Abandoned ids still remembered for late-response detection
    pub(crate) fn retained(&self) -> usize {
        self.state.table.lock().abandoned.len()
    }

    pub(crate) fn shutdown(&self) {
        self.state.table.lock().shutdown = true;
        self.state.wake.notify_all();

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if thread::current().id() == handle.thread().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!("Deadline watcher exited abnormally");
        }
    }

    fn ensure_started(&self, bus: Weak<BusInner>) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || watch(state, bus))?;
        *worker = Some(handle);
        tracing::debug!(thread = %self.thread_name, "Deadline watcher started");
        Ok(())
    }
}

fn watch(state: Arc<WatchState>, bus: Weak<BusInner>) {
    loop {
        let expired = {
            let mut table = state.table.lock();
            loop {
                if table.shutdown {
                    return;
                }
                match table.next_wake() {
                    None => state.wake.wait(&mut table),
                    Some(at) if at > Instant::now() => {
                        state.wake.wait_until(&mut table, at);
                    }
                    Some(_) => break,
                }
            }
            table.expire(Instant::now())
        };

        if expired.is_empty() {
            continue;
        }

        // A dropped bus flags shutdown itself, keep pruning until then
        if let Some(inner) = bus.upgrade() {
            let bus = MessageBus::from_inner(inner);
            for pending in expired {
                bus.abandon(pending.pair, &pending.request);
            }
        }
    }
}
