//! Rate limiter errors

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::LimitClass;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded for {class}: retry after {retry_after_secs}s")]
    Exceeded {
        class: LimitClass,
        retry_after_secs: u64,
        reset_at: DateTime<Utc>,
    },

    #[error("Identity blocked until {until}")]
    Blocked {
        until: DateTime<Utc>,
        retry_after_secs: u64,
    },

    #[error("Identity cannot be empty")]
    EmptyIdentity,
}

impl RateLimitError {
    /// Seconds the caller should wait (always at least 1 for denials)
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RateLimitError::Exceeded {
                retry_after_secs, ..
            }
            | RateLimitError::Blocked {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            RateLimitError::EmptyIdentity => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            RateLimitError::Exceeded { .. } => "RateLimited",
            RateLimitError::Blocked { .. } => "Blocked",
            RateLimitError::EmptyIdentity => "EmptyIdentity",
        }
    }
}

pub type RateLimitResult<T> = Result<T, RateLimitError>;
