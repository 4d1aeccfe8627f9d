use crate::envelope::EnvelopeError;
use crate::topics::{Namespace, TopicId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Topic '{name}' is already registered as a {namespace}")]
    DuplicateRegistration { namespace: Namespace, name: String },

    #[error("Topic '{name}' hashes to id {id} already taken by '{existing}', choose another name")]
    HashCollision {
        name: String,
        existing: String,
        id: TopicId,
    },

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Execution unit '{0}' is no longer accepting tasks")]
    UnitStopped(String),

    #[error("Actor '{0}' has been dropped")]
    ActorGone(String),

    #[error("Invalid thread name {0:?}: names must not contain NUL bytes")]
    InvalidName(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<EnvelopeError> for BusError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::TypeMismatch { expected, got } => Self::TypeMismatch { expected, got },
        }
    }
}

impl BusError {
    /// Whether this error comes from a bad registration rather than from runtime traffic.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateRegistration { .. }
                | Self::HashCollision { .. }
                | Self::InvalidName(_)
                | Self::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
