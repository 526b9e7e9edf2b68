//! Outbox errors

use casepay_core::ErrorKind;
use thiserror::Error;

/// Failure reported by an external collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{collaborator}: {message}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Subscriber '{name}' failed: {source}")]
    SubscriberFailed {
        name: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("Retry store error: {0}")]
    RetryStore(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed delivery not found: {0}")]
    DeliveryNotFound(String),

    #[error("Corrupt retry row: {0}")]
    CorruptRow(String),
}

impl BusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BusError::SubscriberFailed { .. } => ErrorKind::Dependency,
            BusError::DeliveryNotFound(_) => ErrorKind::NotFound,
            BusError::RetryStore(_) | BusError::Serialization(_) | BusError::CorruptRow(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            BusError::SubscriberFailed { .. } => "DependencyError",
            BusError::DeliveryNotFound(_) => "NotFound",
            BusError::RetryStore(_) | BusError::Serialization(_) | BusError::CorruptRow(_) => {
                "Internal"
            }
        }
    }
}

pub type BusResult<T> = Result<T, BusError>;
