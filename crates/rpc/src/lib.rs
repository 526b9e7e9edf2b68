//! CasePay RPC - Desk facade and CLI
//!
//! Every outward operation runs the same pipeline:
//! rate limit → access policy → mutation (with its audit entry) → outbox.
//! Errors leave the facade as [`ApiError`].

pub mod commands;
pub mod config;
pub mod desk;
pub mod error;
pub mod tasks;

pub use config::{AuditSettings, DeskConfig, OutboxSettings};
pub use desk::{CaseView, Desk};
pub use error::{ApiError, ApiResult, DeskError, DeskResult};
