//! CasePay Payment - The payment ledger
//!
//! A customer pays a case by bank transfer of an exact amount
//! `base + unique_code`. The operator who sees the transfer searches for the
//! matching pending payment and confirms it, which is the only way a case
//! leaves `DRAFT` for `RECEIVED`.

pub mod allocator;
pub mod config;
pub mod error;
pub mod ledger;

pub use allocator::{CodeSource, FixedCodes, RandomCodes, UniqueCodeAllocator};
pub use config::PaymentConfig;
pub use error::{PaymentError, PaymentResult};
pub use ledger::{Confirmation, CreatedPayment, PaymentLedger, SearchOutcome};
