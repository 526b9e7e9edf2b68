//! Desk errors and their wire form

use casepay_audit::AuditError;
use casepay_bus::BusError;
use casepay_core::{CoreError, ErrorKind};
use casepay_lifecycle::LifecycleError;
use casepay_payment::PaymentError;
use casepay_policy::PolicyError;
use casepay_ratelimit::RateLimitError;
use casepay_store::StoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Mirror secret is not configured")]
    SecretNotConfigured,
}

impl DeskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeskError::RateLimit(RateLimitError::EmptyIdentity) => ErrorKind::Validation,
            DeskError::RateLimit(_) => ErrorKind::RateLimited,
            DeskError::Policy(err) => err.kind(),
            DeskError::Payment(err) => err.kind(),
            DeskError::Lifecycle(err) => err.kind(),
            DeskError::Store(err) => err.kind(),
            DeskError::Audit(err) => err.kind(),
            DeskError::Bus(err) => err.kind(),
            DeskError::Core(err) => err.kind(),
            DeskError::SecretNotConfigured => ErrorKind::Forbidden,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            DeskError::RateLimit(err) => err.tag(),
            DeskError::Policy(err) => err.tag(),
            DeskError::Payment(err) => err.tag(),
            DeskError::Lifecycle(err) => err.tag(),
            DeskError::Store(err) => err.tag(),
            DeskError::Audit(err) => err.tag(),
            DeskError::Bus(err) => err.tag(),
            DeskError::Core(err) => err.tag(),
            DeskError::SecretNotConfigured => "Unauthorized",
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            DeskError::RateLimit(err) => err.retry_after_secs(),
            _ => None,
        }
    }
}

pub type DeskResult<T> = Result<T, DeskError>;

/// Error as returned to callers: stable tag, readable message, nothing
/// internal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{tag}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub tag: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Internal => {
                tracing::error!(error = %err, "internal error");
                "Internal error".to_string()
            }
            _ => err.to_string(),
        };
        Self {
            kind,
            tag: err.tag(),
            message,
            retry_after_secs: err.retry_after_secs(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
