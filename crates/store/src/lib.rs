//! CasePay Store - The case book
//!
//! Cases and their payment attempts are kept together in one record per
//! case, each behind its own lock. [`CaseBook::transact`] is the only way to
//! mutate a record: the closure works on a copy that replaces the stored
//! record only if the closure succeeds.

pub mod book;
pub mod error;
pub mod record;

pub use book::CaseBook;
pub use error::{StoreError, StoreResult};
pub use record::CaseRecord;
