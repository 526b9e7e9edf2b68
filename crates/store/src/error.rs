//! Store errors

use casepay_core::{CaseId, ErrorKind, PaymentId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Case not found: {0}")]
    CaseNotFound(CaseId),

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("Case already exists: {0}")]
    DuplicateCase(CaseId),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::CaseNotFound(_) | StoreError::PaymentNotFound(_) => ErrorKind::NotFound,
            StoreError::DuplicateCase(_) => ErrorKind::Conflict,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            StoreError::CaseNotFound(_) | StoreError::PaymentNotFound(_) => "NotFound",
            StoreError::DuplicateCase(_) => "DuplicateCase",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
