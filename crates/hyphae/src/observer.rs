//! Observability sink for dispatch-time problems
//!
//! Sends are fire-and-forget, so nothing that goes wrong after the send call
//! returns can reach the sender. Instead every such event is reported to an
//! [`Observer`] injected into the bus. The default [`TracingObserver`] logs
//! through `tracing`.

use crate::error::BusError;
use crate::metrics::BusMetrics;
use crate::topics::{PairId, TopicId};
use std::sync::Arc;

/// A send whose target had no registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMiss {
    /// Published to a topic nobody subscribed to
    Publish(TopicId),
    /// Request for a topic without a responder
    Request(PairId),
    /// Response for a pair without a requester
    Response(PairId),
}

impl std::fmt::Display for RoutingMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Publish(topic) => write!(f, "no subscribers for topic {}", topic),
            Self::Request(pair) => write!(f, "no responder for request {}", pair),
            Self::Response(pair) => write!(f, "no requester for response {}", pair),
        }
    }
}

/// Receives reports about dispatch-time events.
///
/// Methods are called from whatever thread hit the event (a sender, or an
/// actor worker for faults) and must not block.
pub trait Observer: Send + Sync {
    fn routing_miss(&self, miss: RoutingMiss);

    /// A receiver refused a delivery
    fn delivery_failed(&self, receiver: &str, error: &BusError);

    /// A task panicked on an actor's worker
    fn worker_fault(&self, unit: &str, reason: &str);

    fn request_abandoned(&self, _pair: PairId) {}

    fn late_response(&self, _pair: PairId) {}
}

/// Default observer, logs every event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn routing_miss(&self, miss: RoutingMiss) {
        tracing::warn!(%miss, "Routing miss");
    }

    fn delivery_failed(&self, receiver: &str, error: &BusError) {
        tracing::warn!(receiver, %error, "Delivery failed");
    }

    fn worker_fault(&self, unit: &str, reason: &str) {
        tracing::error!(unit, reason, "Task panicked on actor worker");
    }

    fn request_abandoned(&self, pair: PairId) {
        tracing::warn!(%pair, "Request abandoned after timeout");
    }

    fn late_response(&self, pair: PairId) {
        tracing::debug!(%pair, "Dropping response to abandoned request");
    }
}

/// Counts every event into [`BusMetrics`] before forwarding it
pub(crate) struct MeteredObserver {
    inner: Arc<dyn Observer>,
    metrics: BusMetrics,
}

impl MeteredObserver {
    pub(crate) fn new(inner: Arc<dyn Observer>, metrics: BusMetrics) -> Self {
        Self { inner, metrics }
    }
}

impl Observer for MeteredObserver {
    fn routing_miss(&self, miss: RoutingMiss) {
        self.metrics.record_routing_miss();
        self.inner.routing_miss(miss);
    }

    fn delivery_failed(&self, receiver: &str, error: &BusError) {
        self.metrics.record_delivery_failure();
        self.inner.delivery_failed(receiver, error);
    }

    fn worker_fault(&self, unit: &str, reason: &str) {
        self.metrics.record_worker_fault();
        self.inner.worker_fault(unit, reason);
    }

    fn request_abandoned(&self, pair: PairId) {
        self.metrics.record_abandoned();
        self.inner.request_abandoned(pair);
    }

    fn late_response(&self, pair: PairId) {
        self.metrics.record_late_response();
        self.inner.late_response(pair);
    }
}
