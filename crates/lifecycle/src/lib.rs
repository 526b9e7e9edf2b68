//! CasePay Lifecycle - Case status machine
//!
//! Staff drive cases through the adjacency table in
//! [`casepay_core::CaseStatus::transition_to`]. `DRAFT → RECEIVED` is not
//! available here; only the payment ledger applies it.
//!
//! The retention predicate and sweep live in [`retention`].

pub mod error;
pub mod lifecycle;
pub mod retention;

pub use error::{LifecycleError, LifecycleResult};
pub use lifecycle::CaseLifecycle;
pub use retention::{should_cancel, RetentionConfig, SweepSummary};
