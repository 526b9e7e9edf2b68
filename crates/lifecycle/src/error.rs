//! Lifecycle errors

use casepay_audit::AuditError;
use casepay_core::{CaseId, CaseStatus, ErrorKind};
use casepay_policy::PolicyError;
use casepay_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("Invalid transition {from} -> {to}")]
    InvalidTransition { from: CaseStatus, to: CaseStatus },

    #[error("Case {case_id} is {status} and can no longer change")]
    CaseTerminal { case_id: CaseId, status: CaseStatus },

    #[error("Case title cannot be empty")]
    EmptyTitle,

    #[error("Sale listing requires an asking price")]
    MissingAskingPrice,
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Store(err) => err.kind(),
            LifecycleError::Audit(err) => err.kind(),
            LifecycleError::Policy(err) => err.kind(),
            LifecycleError::InvalidTransition { .. } | LifecycleError::CaseTerminal { .. } => {
                ErrorKind::Conflict
            }
            LifecycleError::EmptyTitle | LifecycleError::MissingAskingPrice => ErrorKind::Validation,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            LifecycleError::Store(err) => err.tag(),
            LifecycleError::Audit(err) => err.tag(),
            LifecycleError::Policy(err) => err.tag(),
            LifecycleError::InvalidTransition { .. } => "InvalidTransition",
            LifecycleError::CaseTerminal { .. } => "InvalidStatus",
            LifecycleError::EmptyTitle => "EmptyTitle",
            LifecycleError::MissingAskingPrice => "MissingAskingPrice",
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
