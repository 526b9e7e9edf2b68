//! Policy errors

use casepay_core::{ActorId, ErrorKind, Role};
use thiserror::Error;

use crate::access::Capability;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("{role} {actor} may not {capability}")]
    Forbidden {
        actor: ActorId,
        role: Role,
        capability: Capability,
    },

    /// The case exists but is outside the actor's visibility; reported as
    /// not found so existence does not leak
    #[error("Case not found: {0}")]
    NotVisible(String),

    #[error("Assignee {0} is not an operator")]
    InvalidAssignee(ActorId),

    #[error("Shared secret rejected")]
    SecretMismatch,
}

impl PolicyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::Forbidden { .. } | PolicyError::SecretMismatch => ErrorKind::Forbidden,
            PolicyError::NotVisible(_) => ErrorKind::NotFound,
            PolicyError::InvalidAssignee(_) => ErrorKind::Validation,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            PolicyError::Forbidden { .. } => "Forbidden",
            PolicyError::NotVisible(_) => "NotFound",
            PolicyError::InvalidAssignee(_) => "InvalidAssignee",
            PolicyError::SecretMismatch => "Unauthorized",
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
