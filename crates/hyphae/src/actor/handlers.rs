//! Typed adapters between user callbacks and the bus
//!
//! Each adapter narrows the envelopes it receives to its concrete message
//! types and schedules the callback on the owning actor's worker. The
//! narrowing happens on the sender's thread so a [`BusError::TypeMismatch`]
//! is reported through the bus observer right away.
//!
//! Adapters reach their actor through a weak handle: once the actor is
//! dropped, deliveries fail with [`BusError::ActorGone`] instead of running
//! against a dead actor.

use super::instance::{Actor, ActorCell};
use crate::envelope::{Envelope, Message};
use crate::error::{BusError, Result};
use crate::receiver::{MessageReceiver, RequestReceiver, ResponseReceiver};
use crate::topics::PairId;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// Abandon callback type used when a requester does not want one
pub type NoAbandon<Req> = fn(Arc<Req>);

#[derive(Clone)]
pub(crate) struct ActorHandle {
    cell: Weak<ActorCell>,
    name: String,
}

impl ActorHandle {
    pub(crate) fn new(actor: &Actor) -> Self {
        Self {
            cell: actor.downgrade(),
            name: actor.name().to_string(),
        }
    }

    fn upgrade(&self) -> Result<Arc<ActorCell>> {
        self.cell
            .upgrade()
            .ok_or_else(|| BusError::ActorGone(self.name.clone()))
    }

    fn schedule<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.upgrade()?.unit.enqueue(task)
    }
}

/// Runs `handler(message)` on the actor for every published message
pub struct Subscriber<M, F> {
    actor: ActorHandle,
    handler: Arc<Mutex<F>>,
    _message: PhantomData<fn(Arc<M>)>,
}

impl<M, F> Subscriber<M, F>
where
    M: Message,
    F: FnMut(Arc<M>) + Send + 'static,
{
    pub fn new(actor: &Actor, handler: F) -> Self {
        Self {
            actor: ActorHandle::new(actor),
            handler: Arc::new(Mutex::new(handler)),
            _message: PhantomData,
        }
    }
}

impl<M, F> MessageReceiver for Subscriber<M, F>
where
    M: Message,
    F: FnMut(Arc<M>) + Send + 'static,
{
    fn receiver_name(&self) -> &str {
        &self.actor.name
    }

    fn deliver(&self, msg: &Envelope) -> Result<()> {
        let msg = msg.downcast::<M>()?;
        let handler = Arc::clone(&self.handler);
        self.actor.schedule(move || {
            let mut handler = handler.lock();
            (*handler)(msg);
        })
    }
}

/// Runs `on_response(request, response)` on the requesting actor
///
/// Optionally runs `on_abandoned(request)` when a timed request expires.
pub struct ResponseHandler<Req, Resp, F, G = NoAbandon<Req>> {
    actor: ActorHandle,
    on_response: Arc<Mutex<F>>,
    on_abandoned: Option<Arc<Mutex<G>>>,
    _messages: PhantomData<fn(Arc<Req>, Arc<Resp>)>,
}

impl<Req, Resp, F> ResponseHandler<Req, Resp, F>
where
    Req: Message,
    Resp: Message,
    F: FnMut(Arc<Req>, Arc<Resp>) + Send + 'static,
{
    pub fn new(actor: &Actor, on_response: F) -> Self {
        Self {
            actor: ActorHandle::new(actor),
            on_response: Arc::new(Mutex::new(on_response)),
            on_abandoned: None,
            _messages: PhantomData,
        }
    }
}

impl<Req, Resp, F, G> ResponseHandler<Req, Resp, F, G>
where
    Req: Message,
    Resp: Message,
    F: FnMut(Arc<Req>, Arc<Resp>) + Send + 'static,
    G: FnMut(Arc<Req>) + Send + 'static,
{
    pub fn with_abandon(actor: &Actor, on_response: F, on_abandoned: G) -> Self {
        Self {
            actor: ActorHandle::new(actor),
            on_response: Arc::new(Mutex::new(on_response)),
            on_abandoned: Some(Arc::new(Mutex::new(on_abandoned))),
            _messages: PhantomData,
        }
    }
}

impl<Req, Resp, F, G> ResponseReceiver for ResponseHandler<Req, Resp, F, G>
where
    Req: Message,
    Resp: Message,
    F: FnMut(Arc<Req>, Arc<Resp>) + Send + 'static,
    G: FnMut(Arc<Req>) + Send + 'static,
{
    fn receiver_name(&self) -> &str {
        &self.actor.name
    }

    fn deliver_response(&self, request: &Envelope, response: &Envelope) -> Result<()> {
        let request = request.downcast::<Req>()?;
        let response = response.downcast::<Resp>()?;
        let handler = Arc::clone(&self.on_response);
        self.actor.schedule(move || {
            let mut handler = handler.lock();
            (*handler)(request, response);
        })
    }

    fn deliver_abandoned(&self, _pair: PairId, request: &Envelope) -> Result<()> {
        let Some(on_abandoned) = &self.on_abandoned else {
            return Ok(());
        };

        let request = request.downcast::<Req>()?;
        let handler = Arc::clone(on_abandoned);
        self.actor.schedule(move || {
            let mut handler = handler.lock();
            (*handler)(request);
        })
    }
}

/// Answers requests on the responding actor
///
/// The scheduled task computes `handler(request)` and immediately sends the
/// result back through the bus on the same request lane.
pub struct RequestHandler<Req, Resp, F> {
    actor: ActorHandle,
    handler: Arc<Mutex<F>>,
    _messages: PhantomData<fn(Arc<Req>) -> Resp>,
}

impl<Req, Resp, F> RequestHandler<Req, Resp, F>
where
    Req: Message,
    Resp: Message,
    F: FnMut(Arc<Req>) -> Resp + Send + 'static,
{
    pub fn new(actor: &Actor, handler: F) -> Self {
        Self {
            actor: ActorHandle::new(actor),
            handler: Arc::new(Mutex::new(handler)),
            _messages: PhantomData,
        }
    }
}

impl<Req, Resp, F> RequestReceiver for RequestHandler<Req, Resp, F>
where
    Req: Message,
    Resp: Message,
    F: FnMut(Arc<Req>) -> Resp + Send + 'static,
{
    fn receiver_name(&self) -> &str {
        &self.actor.name
    }

    fn deliver_request(&self, pair: PairId, request: &Envelope) -> Result<()> {
        let typed = request.downcast::<Req>()?;
        let cell = self.actor.upgrade()?;
        let bus = cell.bus.clone();
        let request = request.clone();
        let handler = Arc::clone(&self.handler);

        cell.unit.enqueue(move || {
            let response = {
                let mut handler = handler.lock();
                (*handler)(typed)
            };
            bus.send_response(pair, request, Envelope::new(response));
        })
    }
}
