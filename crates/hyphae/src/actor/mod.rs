//! Actors: execution units bound to the message bus
//!
//! This module provides the actor side of the bus:
//! - Every [`Actor`] owns one [`ExecutionUnit`], a dedicated worker thread
//!   that runs queued tasks strictly one at a time
//! - Typed handlers ([`Subscriber`], [`RequestHandler`], [`ResponseHandler`])
//!   narrow bus envelopes and queue user callbacks on their actor
//! - Panics inside callbacks are caught and handled per [`FaultPolicy`]
//!
//! # Example
//!
//! ```rust,no_run
//! use hyphae::{Actor, MessageBus};
//! use std::sync::Arc;
//!
//! # fn main() -> hyphae::Result<()> {
//! let bus = MessageBus::new();
//! let client = Actor::new("client", &bus)?;
//! let server = Actor::new("server", &bus)?;
//!
//! server.add_response("double", |n: Arc<u32>| *n * 2)?;
//! let lane = client.add_request("double", "client", |req: Arc<u32>, resp: Arc<u32>| {
//!     println!("{} doubled is {}", req, resp);
//! })?;
//!
//! client.send_request(lane, 21u32);
//! # Ok(())
//! # }
//! ```

mod handlers;
mod instance;
mod supervisor;
mod unit;

pub use handlers::{NoAbandon, RequestHandler, ResponseHandler, Subscriber};
pub use instance::Actor;
pub use supervisor::FaultPolicy;
pub use unit::{ExecutionUnit, Task, TeardownMode, UnitOptions, UnitState};
