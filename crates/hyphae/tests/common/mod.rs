#![allow(dead_code)]

use hyphae::{BusError, Observer, PairId, RoutingMiss};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds or `WAIT` elapses
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub symbol: String,
    pub qty: u32,
}

/// Observer that keeps every event as a string
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl Observer for Recorder {
    fn routing_miss(&self, miss: RoutingMiss) {
        self.events.lock().push(format!("miss {}", miss));
    }

    fn delivery_failed(&self, receiver: &str, error: &BusError) {
        self.events
            .lock()
            .push(format!("failed {} {}", receiver, error));
    }

    fn worker_fault(&self, unit: &str, reason: &str) {
        self.events.lock().push(format!("fault {} {}", unit, reason));
    }

    fn request_abandoned(&self, pair: PairId) {
        self.events.lock().push(format!("abandoned {}", pair));
    }

    fn late_response(&self, pair: PairId) {
        self.events.lock().push(format!("late {}", pair));
    }
}
