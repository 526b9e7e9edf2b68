//! Status machines for cases and payments
//!
//! ```text
//! DRAFT ──(payment confirmed)──► RECEIVED ──► IN_REVIEW ──► NEED_MORE_INFO ◄──┐
//!                                                 │              │            │
//!                                                 └──────► IN_PROGRESS ◄──────┘
//!                                                                │    ▲
//!                                                                ▼    │ (reopen)
//!                                                             RESOLVED ──► CLOSED
//!
//! any non-terminal state ──► REJECTED
//! ```

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Lifecycle status of a case
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    /// Created, waiting for payment
    Draft,
    /// Payment confirmed, queued for staff
    Received,
    InReview,
    NeedMoreInfo,
    InProgress,
    Resolved,
    /// Terminal
    Closed,
    /// Terminal
    Rejected,
}

/// Who may drive a given transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Only the payment ledger may apply it (`DRAFT → RECEIVED`)
    PaymentConfirmation,
    /// Staff status edit (also used by the retention sweep for cancellation)
    Staff,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Closed | CaseStatus::Rejected)
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, CaseStatus::Draft)
    }

    /// The adjacency table. `None` means the transition does not exist.
    pub fn transition_to(&self, next: CaseStatus) -> Option<TransitionKind> {
        use CaseStatus::*;

        if self.is_terminal() || *self == next {
            return None;
        }

        match (self, next) {
            (Draft, Received) => Some(TransitionKind::PaymentConfirmation),
            (_, Rejected) => Some(TransitionKind::Staff),
            (Received, InReview)
            | (InReview, NeedMoreInfo)
            | (InReview, InProgress)
            | (NeedMoreInfo, InReview)
            | (NeedMoreInfo, InProgress)
            | (InProgress, NeedMoreInfo)
            | (InProgress, Resolved)
            | (Resolved, InProgress)
            | (Resolved, Closed) => Some(TransitionKind::Staff),
            _ => None,
        }
    }

    /// True if staff may move a case from `self` to `next` directly
    pub fn staff_can_transition_to(&self, next: CaseStatus) -> bool {
        self.transition_to(next) == Some(TransitionKind::Staff)
    }
}

/// Status of a payment attempt (and the payment status mirrored on its case)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
    Rejected,
}

impl PaymentStatus {
    /// Everything except `PENDING` is final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}
