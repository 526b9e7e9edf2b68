//! CasePay Core - Domain types
//!
//! This crate contains the fundamental types shared by every CasePay crate:
//! - `Amount` / `UniqueCode`: integer minor-unit amounts and the payment disambiguation suffix
//! - `CaseStatus` / `PaymentStatus`: closed status machines (with the transition table)
//! - `Case` / `Payment`: the records being paid for and the payment attempts
//! - `Actor` / `Role`: who is calling, as input to access policy
//! - `ErrorKind`: the error taxonomy every crate maps its errors onto

pub mod actor;
pub mod amount;
pub mod case;
pub mod error;
pub mod ids;
pub mod payment;
pub mod status;

pub use actor::{Actor, Role};
pub use amount::{Amount, UniqueCode};
pub use case::{Attachment, Case, CaseDetails, CaseKind, CaseSnapshot};
pub use error::{CoreError, ErrorKind};
pub use ids::{ActorId, CaseId, OrderRef, PaymentId};
pub use payment::{Payment, PaymentPayload, Resolution};
pub use status::{CaseStatus, PaymentStatus, TransitionKind};
