use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Anything that can travel over the bus.
///
/// Payloads are shared between every holder via `Arc`, so they only need to
/// be thread-safe; no serialization is involved.
pub trait Message: Any + Send + Sync {}

impl<T: Any + Send + Sync> Message for T {}

/// Error types for envelope operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
}

/// Process-unique identity of one sent message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type-tagged, reference-counted message
///
/// The bus only ever sees envelopes. Typed handlers narrow them back with
/// [`Envelope::downcast`], which checks the tag first and reports a
/// [`EnvelopeError::TypeMismatch`] instead of misreading the payload.
/// Cloning an envelope shares the payload and keeps its [`MessageId`].
#[derive(Clone)]
pub struct Envelope {
    id: MessageId,
    type_id: TypeId,
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("payload", &"<opaque>")
            .finish()
    }
}

impl Envelope {
    /// Wrap a message in a new envelope
    pub fn new<M: Message>(msg: M) -> Self {
        Self::from_arc(Arc::new(msg))
    }

    /// Wrap an already shared message without copying it
    pub fn from_arc<M: Message>(msg: Arc<M>) -> Self {
        Self {
            id: MessageId::next(),
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
            payload: msg,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if this envelope carries a specific message type
    pub fn is<M: Message>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    /// Narrow the payload to a concrete message type
    pub fn downcast<M: Message>(&self) -> Result<Arc<M>, EnvelopeError> {
        let mismatch = || EnvelopeError::TypeMismatch {
            expected: std::any::type_name::<M>(),
            got: self.type_name,
        };

        if !self.is::<M>() {
            return Err(mismatch());
        }

        Arc::clone(&self.payload)
            .downcast::<M>()
            .map_err(|_| mismatch())
    }

    /// Number of live handles to the payload
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.payload)
    }
}

impl<M: Message> From<Arc<M>> for Envelope {
    fn from(msg: Arc<M>) -> Self {
        Self::from_arc(msg)
    }
}
