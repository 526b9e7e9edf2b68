//! CasePay Audit - Append-only audit trail
//!
//! Every mutating operation appends exactly one [`AuditLogEntry`] for the
//! case it touched. Entries are immutable: there is no update or delete.
//!
//! Per subject, entries form a hash chain (`prev_hash` → `hash`) so any
//! edit to a persisted journal is detected on replay.

pub mod entry;
pub mod error;
pub mod hash;
pub mod journal;
pub mod trail;

pub use entry::{actions, AuditLogEntry};
pub use error::{AuditError, AuditResult};
pub use hash::{calculate_entry_hash, verify_chain, ChainError, GENESIS};
pub use journal::Journal;
pub use trail::AuditTrail;
