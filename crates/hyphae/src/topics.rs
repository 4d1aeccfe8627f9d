//! Topic identifiers and the name registry
//!
//! Topic names are hashed into stable numeric ids once, at registration time.
//! Every later send uses the id only. The registry remembers which name each
//! id came from so two different names that hash to the same id are rejected
//! instead of silently sharing a route.
//!
//! Ids are shared by four namespaces (publishers, subscribers, requesters and
//! responders). The namespaces are checked separately by the bus: the same
//! name may be a publisher and a responder at the same time.

use crate::error::{BusError, Result};
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64;

/// Numeric identifier of a topic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicId(u64);

impl TopicId {
    /// Hash a topic name into its id
    pub fn of(name: &str) -> Self {
        Self(xxh3_64(name.as_bytes()))
    }

    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One requester lane for one request topic.
///
/// `topic` selects the responder, the full pair selects which response
/// handler gets the answer. The derived `Hash` feeds both components to the
/// hasher in order, so `(a, b)` and `(b, a)` land in different buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId {
    pub topic: TopicId,
    pub responder: TopicId,
}

impl PairId {
    pub fn new(topic: TopicId, responder: TopicId) -> Self {
        Self { topic, responder }
    }

    /// Build the pair id for a request topic name and responder name
    pub fn of(topic: &str, responder: &str) -> Self {
        Self::new(TopicId::of(topic), TopicId::of(responder))
    }
}

impl std::fmt::Display for PairId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.topic, self.responder)
    }
}

/// Registration namespaces of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Publisher,
    Subscriber,
    Requester,
    Responder,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
            Self::Requester => "requester",
            Self::Responder => "responder",
        };
        f.write_str(name)
    }
}

/// Name table shared by all namespaces
#[derive(Debug, Default)]
pub struct TopicRegistry {
    names: HashMap<TopicId, String>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `name` and remember it, failing if a different name already owns the id
    pub fn intern(&mut self, name: &str) -> Result<TopicId> {
        let id = TopicId::of(name);
        match self.names.get(&id) {
            Some(existing) if existing != name => Err(BusError::HashCollision {
                name: name.to_string(),
                existing: existing.clone(),
                id,
            }),
            Some(_) => Ok(id),
            None => {
                self.names.insert(id, name.to_string());
                Ok(id)
            }
        }
    }

    /// Name a previously interned id was created from
    pub fn name_of(&self, id: TopicId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn force(&mut self, id: TopicId, name: &str) {
        self.names.insert(id, name.to_string());
    }
}
