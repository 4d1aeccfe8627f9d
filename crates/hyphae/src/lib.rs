//! Hyphae: in-process message bus for actors
//!
//! Actors talk to each other through a [`MessageBus`] using two patterns:
//!
//! - **Publish/subscribe**: one publisher per topic, any number of
//!   subscribers, every subscriber gets every message
//! - **Request/response**: a requester and a responder correlated by a
//!   [`PairId`] made of the topic and the responder's name
//!
//! Every [`Actor`] owns an [`ExecutionUnit`], a private worker thread that
//! runs its handlers strictly one at a time in arrival order. Sends never
//! block on handler execution.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use hyphae::{Actor, MessageBus};
//! use std::sync::Arc;
//!
//! # fn main() -> hyphae::Result<()> {
//! let bus = MessageBus::new();
//! let sensor = Actor::new("sensor", &bus)?;
//! let logger = Actor::new("logger", &bus)?;
//!
//! let temps = sensor.add_publisher("temperature")?;
//! logger.add_subscriber("temperature", |celsius: Arc<f64>| {
//!     println!("{:.1} C", celsius);
//! })?;
//!
//! sensor.send_message(temps, 21.5f64);
//! # Ok(())
//! # }
//! ```
//!
//! Problems that happen after a send returns (no route, type mismatch,
//! dead actor, panicking handler) are reported to the bus [`Observer`] and
//! counted in [`BusMetrics`].

pub mod actor;
pub mod bus;
pub mod config;
mod deadline;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod parallel;
pub mod receiver;
pub mod topics;

pub use actor::{
    Actor, ExecutionUnit, FaultPolicy, NoAbandon, RequestHandler, ResponseHandler, Subscriber,
    Task, TeardownMode, UnitOptions, UnitState,
};
pub use bus::MessageBus;
pub use config::{BusConfig, ConfigError};
pub use envelope::{Envelope, EnvelopeError, Message, MessageId};
pub use error::{BusError, Result};
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use observer::{Observer, RoutingMiss, TracingObserver};
pub use parallel::{available_concurrency, parallel_for, partition};
pub use receiver::{MessageReceiver, RequestReceiver, ResponseReceiver};
pub use topics::{Namespace, PairId, TopicId, TopicRegistry};
