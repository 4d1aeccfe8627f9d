use crate::config::BusConfig;
use crate::deadline::{Completion, DeadlineWatcher};
use crate::envelope::Envelope;
use crate::error::{BusError, Result};
use crate::metrics::BusMetrics;
use crate::observer::{MeteredObserver, Observer, RoutingMiss, TracingObserver};
use crate::receiver::{MessageReceiver, RequestReceiver, ResponseReceiver};
use crate::topics::{Namespace, PairId, TopicId, TopicRegistry};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Message bus coordinator
///
/// Routes three kinds of traffic between actors in the same process:
/// - Publish/subscribe: one message fanned out to every subscriber of a topic
/// - Requests: delivered to the single responder of a request topic
/// - Responses: delivered to the single requester of a (topic, lane) pair
///
/// Registration happens once, when actors are built. Sends look up the
/// receivers under a read lock, release it, then hand the message to each
/// receiver, which only enqueues work on its actor. Nothing a send triggers
/// runs on the sender's thread beyond that hand-off.
///
/// `MessageBus` is a cheap handle; clones share the same routing tables.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

pub(crate) struct BusInner {
    routes: RwLock<Routes>,
    config: BusConfig,
    metrics: BusMetrics,
    observer: Arc<dyn Observer>,
    deadlines: DeadlineWatcher,
}

#[derive(Default)]
struct Routes {
    registry: TopicRegistry,
    publishers: HashSet<TopicId>,
    subscribers: HashMap<TopicId, Vec<Arc<dyn MessageReceiver>>>,
    requesters: HashMap<PairId, Arc<dyn ResponseReceiver>>,
    responders: HashMap<TopicId, Arc<dyn RequestReceiver>>,
}

impl MessageBus {
    /// Create a new message bus with default configuration
    pub fn new() -> Self {
        Self::build(BusConfig::default(), Arc::new(TracingObserver))
    }

    /// Create a message bus with custom configuration
    ///
    /// The configuration is validated first, the same way a loaded file is.
    pub fn with_config(config: BusConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a message bus reporting dispatch events to `observer`
    pub fn with_observer(config: BusConfig, observer: Arc<dyn Observer>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, observer))
    }

    fn build(config: BusConfig, observer: Arc<dyn Observer>) -> Self {
        let metrics = BusMetrics::new();
        let deadlines = DeadlineWatcher::new(config.thread_name("deadlines"));
        Self {
            inner: Arc::new(BusInner {
                routes: RwLock::new(Routes::default()),
                observer: Arc::new(MeteredObserver::new(observer, metrics.clone())),
                metrics,
                config,
                deadlines,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<BusInner>) -> Self {
        Self { inner }
    }

    /// Register a publisher name, each name may have one publisher
    pub fn register_publisher(&self, name: &str) -> Result<TopicId> {
        let mut routes = self.inner.routes.write();
        let id = routes.registry.intern(name)?;
        if !routes.publishers.insert(id) {
            return Err(BusError::DuplicateRegistration {
                namespace: Namespace::Publisher,
                name: name.to_string(),
            });
        }

        tracing::debug!(topic = name, %id, "Registered publisher");
        Ok(id)
    }

    /// Append a subscriber to a topic, topics may have any number of them
    pub fn register_subscriber(
        &self,
        name: &str,
        receiver: Arc<dyn MessageReceiver>,
    ) -> Result<TopicId> {
        let mut routes = self.inner.routes.write();
        let id = routes.registry.intern(name)?;
        let receiver_name = receiver.receiver_name().to_string();
        let subscribers = routes.subscribers.entry(id).or_default();
        subscribers.push(receiver);

        tracing::debug!(
            topic = name,
            %id,
            receiver = %receiver_name,
            position = subscribers.len(),
            "Registered subscriber"
        );
        Ok(id)
    }

    /// Claim the request lane `(topic, responder)` and route its responses to `handler`
    pub fn register_requester(
        &self,
        topic: &str,
        responder: &str,
        handler: Arc<dyn ResponseReceiver>,
    ) -> Result<PairId> {
        let mut routes = self.inner.routes.write();
        let pair = PairId::new(
            routes.registry.intern(topic)?,
            routes.registry.intern(responder)?,
        );
        if routes.requesters.contains_key(&pair) {
            return Err(BusError::DuplicateRegistration {
                namespace: Namespace::Requester,
                name: format!("{}/{}", topic, responder),
            });
        }
        routes.requesters.insert(pair, handler);

        tracing::debug!(topic, responder, %pair, "Registered requester");
        Ok(pair)
    }

    /// Become the single responder for a request topic
    pub fn register_responder(
        &self,
        name: &str,
        handler: Arc<dyn RequestReceiver>,
    ) -> Result<TopicId> {
        let mut routes = self.inner.routes.write();
        let id = routes.registry.intern(name)?;
        if routes.responders.contains_key(&id) {
            return Err(BusError::DuplicateRegistration {
                namespace: Namespace::Responder,
                name: name.to_string(),
            });
        }
        routes.responders.insert(id, handler);

        tracing::debug!(topic = name, %id, "Registered responder");
        Ok(id)
    }

    /// Fan a message out to every subscriber of `topic`, in registration order
    ///
    /// Returns how many subscribers accepted the message. A topic without
    /// subscribers is reported as a routing miss.
    pub fn publish(&self, topic: TopicId, msg: Envelope) -> usize {
        self.inner.metrics.record_publish();

        let receivers = self.inner.routes.read().subscribers.get(&topic).cloned();
        let Some(receivers) = receivers else {
            self.inner.observer.routing_miss(RoutingMiss::Publish(topic));
            return 0;
        };

        let mut delivered = 0;
        for receiver in &receivers {
            match receiver.deliver(&msg) {
                Ok(()) => delivered += 1,
                Err(error) => self
                    .inner
                    .observer
                    .delivery_failed(receiver.receiver_name(), &error),
            }
        }

        self.inner.metrics.record_delivered(delivered as u64);
        delivered
    }

    /// Hand a request to the responder of `pair.topic`
    ///
    /// Arms the configured default deadline, if any.
    pub fn send_request(&self, pair: PairId, request: Envelope) -> bool {
        self.dispatch_request(pair, request, self.inner.config.request_timeout())
    }

    /// Hand a request to its responder and give up on it after `timeout`
    ///
    /// If no response passes through the bus in time, the requester's
    /// handler is told the request was abandoned and a late response is
    /// dropped.
    pub fn send_request_with_timeout(
        &self,
        pair: PairId,
        request: Envelope,
        timeout: Duration,
    ) -> bool {
        self.dispatch_request(pair, request, Some(timeout))
    }

    fn dispatch_request(&self, pair: PairId, request: Envelope, timeout: Option<Duration>) -> bool {
        let responder = self.inner.routes.read().responders.get(&pair.topic).cloned();
        let Some(responder) = responder else {
            self.inner.observer.routing_miss(RoutingMiss::Request(pair));
            return false;
        };

        // Armed before delivery so a fast responder cannot answer an untracked request
        if let Some(timeout) = timeout {
            if let Err(error) = self.inner.deadlines.arm(
                Arc::downgrade(&self.inner),
                pair,
                request.clone(),
                timeout,
            ) {
                tracing::error!(%pair, %error, "Request sent without deadline");
            }
        }

        match responder.deliver_request(pair, &request) {
            Ok(()) => {
                self.inner.metrics.record_request();
                self.inner.metrics.record_delivered(1);
                true
            }
            Err(error) => {
                self.inner
                    .observer
                    .delivery_failed(responder.receiver_name(), &error);
                false
            }
        }
    }

    /// Hand a response to the requester that owns `pair`
    ///
    /// If a timed request's response cannot be narrowed by its requester,
    /// the request is abandoned instead so the requester still hears back.
    pub fn send_response(&self, pair: PairId, request: Envelope, response: Envelope) -> bool {
        let completion = self.inner.deadlines.complete(request.id());
        if completion == Completion::Abandoned {
            self.inner.observer.late_response(pair);
            return false;
        }

        let requester = self.inner.routes.read().requesters.get(&pair).cloned();
        let Some(requester) = requester else {
            self.inner.observer.routing_miss(RoutingMiss::Response(pair));
            return false;
        };

        match requester.deliver_response(&request, &response) {
            Ok(()) => {
                self.inner.metrics.record_response();
                self.inner.metrics.record_delivered(1);
                true
            }
            Err(error) => {
                self.inner
                    .observer
                    .delivery_failed(requester.receiver_name(), &error);
                if let (Completion::Answered(timeout), BusError::TypeMismatch { .. }) =
                    (completion, &error)
                {
                    self.inner.deadlines.retire(request.id(), timeout);
                    self.abandon(pair, &request);
                }
                false
            }
        }
    }

    /// Tell the requester on `pair` that `request` timed out
    pub(crate) fn abandon(&self, pair: PairId, request: &Envelope) {
        self.inner.observer.request_abandoned(pair);

        let requester = self.inner.routes.read().requesters.get(&pair).cloned();
        if let Some(requester) = requester {
            if let Err(error) = requester.deliver_abandoned(pair, request) {
                self.inner
                    .observer
                    .delivery_failed(requester.receiver_name(), &error);
            }
        }
    }

    pub fn subscriber_count(&self, topic: TopicId) -> usize {
        self.inner
            .routes
            .read()
            .subscribers
            .get(&topic)
            .map_or(0, Vec::len)
    }

    pub fn has_publisher(&self, topic: TopicId) -> bool {
        self.inner.routes.read().publishers.contains(&topic)
    }

    pub fn has_responder(&self, topic: TopicId) -> bool {
        self.inner.routes.read().responders.contains_key(&topic)
    }

    pub fn has_requester(&self, pair: PairId) -> bool {
        self.inner.routes.read().requesters.contains_key(&pair)
    }

    /// Name a registered id was hashed from
    pub fn topic_name(&self, id: TopicId) -> Option<String> {
        self.inner.routes.read().registry.name_of(id).map(str::to_string)
    }

    /// Timed requests still waiting for a response
    pub fn in_flight_requests(&self) -> usize {
        self.inner.deadlines.in_flight()
    }

    /// Abandoned request ids still remembered to catch late responses
    pub fn retained_abandoned(&self) -> usize {
        self.inner.deadlines.retained()
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.inner.metrics
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Observer handed to actor workers for fault reports
    pub(crate) fn observer(&self) -> Arc<dyn Observer> {
        Arc::clone(&self.inner.observer)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BusInner {
    fn drop(&mut self) {
        self.deadlines.shutdown();
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes = self.inner.routes.read();
        f.debug_struct("MessageBus")
            .field("topics", &routes.registry.len())
            .field("publishers", &routes.publishers.len())
            .field("subscribed_topics", &routes.subscribers.len())
            .field("requesters", &routes.requesters.len())
            .field("responders", &routes.responders.len())
            .finish()
    }
}
