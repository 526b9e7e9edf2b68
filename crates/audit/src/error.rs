//! Audit errors

use casepay_core::ErrorKind;
use thiserror::Error;

use crate::hash::ChainError;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit field `{0}` cannot be empty")]
    EmptyField(&'static str),

    #[error("Audit entry requires an `after` snapshot")]
    MissingAfter,

    #[error("Audit chain broken for {subject}: {source}")]
    Chain {
        subject: String,
        #[source]
        source: ChainError,
    },

    #[error("Journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Journal serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AuditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::EmptyField(_) | AuditError::MissingAfter => ErrorKind::Validation,
            AuditError::Chain { .. } | AuditError::Io(_) | AuditError::Serde(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            AuditError::EmptyField(_) | AuditError::MissingAfter => "InvalidAuditEntry",
            AuditError::Chain { .. } => "AuditChainBroken",
            AuditError::Io(_) | AuditError::Serde(_) => "Internal",
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
