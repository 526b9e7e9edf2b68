//! Payment ledger errors

use casepay_audit::AuditError;
use casepay_core::{Amount, CaseId, CaseStatus, CoreError, ErrorKind, PaymentId, PaymentStatus, UniqueCode};
use casepay_policy::PolicyError;
use casepay_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("Case {case_id} is not awaiting payment (status {status}, payment {payment_status})")]
    CaseNotAwaitingPayment {
        case_id: CaseId,
        status: CaseStatus,
        payment_status: PaymentStatus,
    },

    #[error("No base amount given and case {0} has no asking price")]
    MissingBaseAmount(CaseId),

    #[error("No pending payment matches amount {amount} with code {code}")]
    NoMatch { amount: Amount, code: UniqueCode },

    #[error("Order reference does not match payment {0}")]
    OrderMismatch(PaymentId),

    #[error("Payment {payment_id} is {status}, not PENDING")]
    InvalidStatus {
        payment_id: PaymentId,
        status: PaymentStatus,
    },

    #[error("Confirmed amount {actual} does not match expected {expected}")]
    AmountMismatch { expected: Amount, actual: Amount },

    #[error("Confirmed code {actual} does not match expected {expected}")]
    CodeMismatch {
        expected: UniqueCode,
        actual: UniqueCode,
    },

    #[error("Invalid unique code range {min}..={max}")]
    InvalidCodeRange { min: u16, max: u16 },
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::Store(err) => err.kind(),
            PaymentError::Audit(err) => err.kind(),
            PaymentError::Policy(err) => err.kind(),
            PaymentError::Core(err) => err.kind(),
            PaymentError::CaseNotAwaitingPayment { .. }
            | PaymentError::OrderMismatch(_)
            | PaymentError::InvalidStatus { .. } => ErrorKind::Conflict,
            PaymentError::NoMatch { .. } => ErrorKind::NotFound,
            PaymentError::MissingBaseAmount(_)
            | PaymentError::AmountMismatch { .. }
            | PaymentError::CodeMismatch { .. }
            | PaymentError::InvalidCodeRange { .. } => ErrorKind::Validation,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            PaymentError::Store(err) => err.tag(),
            PaymentError::Audit(err) => err.tag(),
            PaymentError::Policy(err) => err.tag(),
            PaymentError::Core(err) => err.tag(),
            PaymentError::CaseNotAwaitingPayment { .. } | PaymentError::InvalidStatus { .. } => {
                "InvalidStatus"
            }
            PaymentError::MissingBaseAmount(_) => "MissingBaseAmount",
            PaymentError::NoMatch { .. } => "NotFound",
            PaymentError::OrderMismatch(_) => "OrderMismatch",
            PaymentError::AmountMismatch { .. } => "AmountMismatch",
            PaymentError::CodeMismatch { .. } => "CodeMismatch",
            PaymentError::InvalidCodeRange { .. } => "InvalidConfig",
        }
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;
