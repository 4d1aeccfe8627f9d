//! Counters for bus traffic
//!
//! Cheap atomic counters updated on every dispatch. They are kept even when
//! a custom [`Observer`](crate::Observer) is installed, so tests and
//! operators can always read what happened.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collected for one bus
#[derive(Clone, Default)]
pub struct BusMetrics {
    inner: Arc<BusMetricsInner>,
}

#[derive(Default)]
struct BusMetricsInner {
    /// Messages handed to `publish`
    published_total: AtomicU64,

    /// Successful hand-offs to a receiver (one per subscriber, request or response)
    delivered_total: AtomicU64,

    /// Requests that reached a responder
    requests_total: AtomicU64,

    /// Responses that reached a requester
    responses_total: AtomicU64,

    /// Sends whose target had no registered handler
    routing_misses_total: AtomicU64,

    /// Deliveries rejected by a receiver (type mismatch, stopped actor)
    delivery_failures_total: AtomicU64,

    /// Panics caught inside actor tasks
    worker_faults_total: AtomicU64,

    /// Timed requests that never got an answer
    abandoned_total: AtomicU64,

    /// Responses that arrived after their request was abandoned
    late_responses_total: AtomicU64,
}

/// Point-in-time copy of [`BusMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub requests: u64,
    pub responses: u64,
    pub routing_misses: u64,
    pub delivery_failures: u64,
    pub worker_faults: u64,
    pub abandoned: u64,
    pub late_responses: u64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_publish(&self) {
        self.inner.published_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, count: u64) {
        self.inner.delivered_total.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_request(&self) {
        self.inner.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_response(&self) {
        self.inner.responses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_routing_miss(&self) {
        self.inner.routing_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery_failure(&self) {
        self.inner
            .delivery_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_worker_fault(&self) {
        self.inner.worker_faults_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self) {
        self.inner.abandoned_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_late_response(&self) {
        self.inner.late_responses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn routing_misses(&self) -> u64 {
        self.inner.routing_misses_total.load(Ordering::Relaxed)
    }

    pub fn delivery_failures(&self) -> u64 {
        self.inner.delivery_failures_total.load(Ordering::Relaxed)
    }

    pub fn worker_faults(&self) -> u64 {
        self.inner.worker_faults_total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            published: inner.published_total.load(Ordering::Relaxed),
            delivered: inner.delivered_total.load(Ordering::Relaxed),
            requests: inner.requests_total.load(Ordering::Relaxed),
            responses: inner.responses_total.load(Ordering::Relaxed),
            routing_misses: inner.routing_misses_total.load(Ordering::Relaxed),
            delivery_failures: inner.delivery_failures_total.load(Ordering::Relaxed),
            worker_faults: inner.worker_faults_total.load(Ordering::Relaxed),
            abandoned: inner.abandoned_total.load(Ordering::Relaxed),
            late_responses: inner.late_responses_total.load(Ordering::Relaxed),
        }
    }

    /// Log metrics summary
    pub fn print_summary(&self, bus_name: &str) {
        let s = self.snapshot();
        tracing::info!(
            bus = bus_name,
            published = s.published,
            delivered = s.delivered,
            requests = s.requests,
            responses = s.responses,
            routing_misses = s.routing_misses,
            delivery_failures = s.delivery_failures,
            worker_faults = s.worker_faults,
            abandoned = s.abandoned,
            late_responses = s.late_responses,
            "Bus metrics summary"
        );
    }
}
