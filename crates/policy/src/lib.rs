//! CasePay Policy - Access decisions
//!
//! Pure decision functions, no I/O. Two things live here:
//!
//! - `Visibility`: the one predicate used both to filter a case listing and
//!   to authorize a single-case fetch, so the two paths cannot disagree.
//! - `Capability` checks: who may create, transition, assign and reconcile.
//!
//! `SharedSecret` adds the constant-time check for inbound collaborator
//! credentials.

pub mod access;
pub mod error;
pub mod secret;

pub use access::{authorize, authorize_create_case, can, validate_assignee, Capability, Visibility};
pub use error::{PolicyError, PolicyResult};
pub use secret::SharedSecret;
