//! Type-erased delivery contract between the bus and its handlers
//!
//! The bus only deals in [`Envelope`]s. Each trait here is implemented by a
//! typed adapter in [`crate::actor`] that narrows the envelope and
//! schedules the user callback on the owning actor's worker.
//! Implementations must return quickly: they run on the sender's thread.

use crate::envelope::Envelope;
use crate::error::Result;
use crate::topics::PairId;

/// Receives published messages
pub trait MessageReceiver: Send + Sync {
    /// Name used when reporting failed deliveries
    fn receiver_name(&self) -> &str;

    fn deliver(&self, msg: &Envelope) -> Result<()>;
}

/// Answers requests for one topic
pub trait RequestReceiver: Send + Sync {
    fn receiver_name(&self) -> &str;

    fn deliver_request(&self, pair: PairId, request: &Envelope) -> Result<()>;
}

/// Receives answers on one request lane
pub trait ResponseReceiver: Send + Sync {
    fn receiver_name(&self) -> &str;

    fn deliver_response(&self, request: &Envelope, response: &Envelope) -> Result<()>;

    /// The request timed out before any response arrived
    fn deliver_abandoned(&self, _pair: PairId, _request: &Envelope) -> Result<()> {
        Ok(())
    }
}
