//! Fault handling for actor workers

use serde::{Deserialize, Serialize};
use std::any::Any;

/// What a worker does when one of its tasks panics
///
/// Either way the panic is caught and reported, so it never unwinds into
/// the bus or another actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Report the panic and continue with the next task
    #[default]
    Isolate,

    /// Report the panic and halt this actor, discarding queued tasks
    Escalate,
}

/// Turn a caught panic payload into something loggable
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "Unknown panic".to_string()
    }
}
