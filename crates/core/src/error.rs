//! Error taxonomy and core validation errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::PaymentStatus;

/// Category every CasePay error maps onto
///
/// The category decides how the caller should react:
/// fix the input, stop, wait, or (for `Dependency`) nothing at all,
/// since the core state is already committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input
    Validation,
    /// Referenced entity absent
    NotFound,
    /// State precondition violated
    Conflict,
    /// Access policy denial
    Forbidden,
    /// Admission denied by the rate limiter
    RateLimited,
    /// External collaborator failed after commit
    Dependency,
    /// Unexpected internal failure (never carries detail across the boundary)
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Dependency => "dependency",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by core domain constructors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unique code out of range: {0} (expected {min}..={max})", min = crate::UniqueCode::MIN, max = crate::UniqueCode::MAX)]
    UniqueCodeOutOfRange(u32),

    #[error("Unique code is not numeric: {0:?}")]
    UniqueCodeNotNumeric(String),

    #[error("Amount overflow composing {base} + {code}")]
    AmountOverflow { base: u64, code: u16 },

    #[error("Payment is not pending (status: {0})")]
    PaymentNotPending(PaymentStatus),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::UniqueCodeOutOfRange(_)
            | CoreError::UniqueCodeNotNumeric(_)
            | CoreError::AmountOverflow { .. } => ErrorKind::Validation,
            CoreError::PaymentNotPending(_) => ErrorKind::Conflict,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            CoreError::UniqueCodeOutOfRange(_) | CoreError::UniqueCodeNotNumeric(_) => {
                "InvalidUniqueCode"
            }
            CoreError::AmountOverflow { .. } => "AmountOverflow",
            CoreError::PaymentNotPending(_) => "InvalidStatus",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(ErrorKind::RateLimited.as_str(), "rate_limited");
        assert_eq!(ErrorKind::Conflict.to_string(), "conflict");
        assert_eq!(
            serde_json::to_string(&ErrorKind::NotFound).unwrap(),
            "\"not_found\""
        );
    }

    #[test]
    fn test_core_error_mapping() {
        let err = CoreError::PaymentNotPending(PaymentStatus::Paid);
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.tag(), "InvalidStatus");
        assert!(err.to_string().contains("PAID"));

        let err = CoreError::UniqueCodeOutOfRange(42);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("100..=999"));
    }
}
