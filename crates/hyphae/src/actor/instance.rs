use super::handlers::{RequestHandler, ResponseHandler, Subscriber};
use super::unit::{ExecutionUnit, TeardownMode, UnitOptions, UnitState};
use crate::bus::MessageBus;
use crate::envelope::{Envelope, Message};
use crate::error::Result;
use crate::topics::{PairId, TopicId};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// An execution unit bound to a bus
///
/// Registration helpers forward to the [`MessageBus`] and return the ids
/// used for later sends. Callbacks registered through an actor always run
/// on that actor's own worker thread, one at a time, in arrival order.
/// Sends run on the caller's thread and return as soon as every receiver
/// has queued its work.
///
/// Dropping an actor tears its worker down with the bus's configured
/// [`TeardownMode`]; [`Actor::shutdown`] picks the mode explicitly.
///
/// # Example
///
/// ```rust,no_run
/// use hyphae::{Actor, MessageBus};
///
/// # fn main() -> hyphae::Result<()> {
/// let bus = MessageBus::new();
/// let producer = Actor::new("producer", &bus)?;
/// let consumer = Actor::new("consumer", &bus)?;
///
/// let ticks = producer.add_publisher("ticks")?;
/// consumer.add_subscriber("ticks", |tick: std::sync::Arc<u64>| {
///     println!("tick {}", tick);
/// })?;
///
/// producer.send_message(ticks, 1u64);
/// # Ok(())
/// # }
/// ```
pub struct Actor {
    cell: Arc<ActorCell>,
}

pub(crate) struct ActorCell {
    pub(crate) name: String,
    pub(crate) bus: MessageBus,
    pub(crate) unit: ExecutionUnit,
}

impl Actor {
    /// Create an actor using the bus's teardown and fault policy defaults
    pub fn new(name: impl Into<String>, bus: &MessageBus) -> Result<Self> {
        let config = bus.config();
        let options = UnitOptions {
            teardown: config.teardown,
            fault_policy: config.fault_policy,
            thread_name: None,
        };
        Self::with_options(name, bus, options)
    }

    pub fn with_options(
        name: impl Into<String>,
        bus: &MessageBus,
        mut options: UnitOptions,
    ) -> Result<Self> {
        let name = name.into();
        if options.thread_name.is_none() {
            options.thread_name = Some(bus.config().thread_name(&name));
        }

        let unit = ExecutionUnit::spawn(name.clone(), options, bus.observer())?;
        Ok(Self {
            cell: Arc::new(ActorCell {
                name,
                bus: bus.clone(),
                unit,
            }),
        })
    }

    pub fn add_publisher(&self, topic: &str) -> Result<TopicId> {
        self.cell.bus.register_publisher(topic)
    }

    /// Run `handler` on this actor for every message published on `topic`
    pub fn add_subscriber<M, F>(&self, topic: &str, handler: F) -> Result<TopicId>
    where
        M: Message,
        F: FnMut(Arc<M>) + Send + 'static,
    {
        let subscriber = Subscriber::new(self, handler);
        self.cell.bus.register_subscriber(topic, Arc::new(subscriber))
    }

    /// Claim the request lane `(topic, responder)`; answers run `on_response` here
    pub fn add_request<Req, Resp, F>(
        &self,
        topic: &str,
        responder: &str,
        on_response: F,
    ) -> Result<PairId>
    where
        Req: Message,
        Resp: Message,
        F: FnMut(Arc<Req>, Arc<Resp>) + Send + 'static,
    {
        let handler = ResponseHandler::<Req, Resp, F>::new(self, on_response);
        self.cell
            .bus
            .register_requester(topic, responder, Arc::new(handler))
    }

    /// Like [`Actor::add_request`], also running `on_abandoned` for timed-out requests
    pub fn add_request_with_abandon<Req, Resp, F, G>(
        &self,
        topic: &str,
        responder: &str,
        on_response: F,
        on_abandoned: G,
    ) -> Result<PairId>
    where
        Req: Message,
        Resp: Message,
        F: FnMut(Arc<Req>, Arc<Resp>) + Send + 'static,
        G: FnMut(Arc<Req>) + Send + 'static,
    {
        let handler = ResponseHandler::with_abandon(self, on_response, on_abandoned);
        self.cell
            .bus
            .register_requester(topic, responder, Arc::new(handler))
    }

    /// Answer every request on `topic` with `handler(request)`
    pub fn add_response<Req, Resp, F>(&self, topic: &str, handler: F) -> Result<TopicId>
    where
        Req: Message,
        Resp: Message,
        F: FnMut(Arc<Req>) -> Resp + Send + 'static,
    {
        let handler = RequestHandler::new(self, handler);
        self.cell.bus.register_responder(topic, Arc::new(handler))
    }

    /// Publish `msg`, returning how many subscribers queued it
    pub fn send_message<M: Message>(&self, topic: TopicId, msg: M) -> usize {
        self.cell.bus.publish(topic, Envelope::new(msg))
    }

    pub fn send_request<M: Message>(&self, pair: PairId, request: M) -> bool {
        self.cell.bus.send_request(pair, Envelope::new(request))
    }

    pub fn send_request_with_timeout<M: Message>(
        &self,
        pair: PairId,
        request: M,
        timeout: Duration,
    ) -> bool {
        self.cell
            .bus
            .send_request_with_timeout(pair, Envelope::new(request), timeout)
    }

    pub fn send_response(&self, pair: PairId, request: Envelope, response: Envelope) -> bool {
        self.cell.bus.send_response(pair, request, response)
    }

    /// Run arbitrary work on this actor's worker
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.cell.unit.enqueue(task)
    }

    /// Block until everything queued so far has run, see [`ExecutionUnit::flush`]
    pub fn flush(&self, timeout: Duration) -> Result<bool> {
        self.cell.unit.flush(timeout)
    }

    /// Stop the worker with an explicit teardown mode and wait for it
    ///
    /// Dropping the actor does the same with the configured mode.
    pub fn shutdown(self, mode: TeardownMode) {
        tracing::debug!(actor = %self.cell.name, ?mode, "Shutting down actor");
        self.cell.unit.stop(mode);
    }

    pub fn name(&self) -> &str {
        &self.cell.name
    }

    pub fn bus(&self) -> &MessageBus {
        &self.cell.bus
    }

    pub fn state(&self) -> UnitState {
        self.cell.unit.state()
    }

    pub fn pending(&self) -> usize {
        self.cell.unit.pending()
    }

    pub fn executed(&self) -> u64 {
        self.cell.unit.executed()
    }

    pub(crate) fn downgrade(&self) -> Weak<ActorCell> {
        Arc::downgrade(&self.cell)
    }
}

impl Drop for Actor {
    // Handlers may briefly hold the cell on another thread; tear down here
    // so the owner is the one that waits for the worker
    fn drop(&mut self) {
        self.cell.unit.stop(self.cell.unit.teardown_mode());
    }
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("name", &self.cell.name)
            .field("unit", &self.cell.unit)
            .finish()
    }
}
