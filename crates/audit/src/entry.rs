//! Audit log entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action tags written by CasePay operations
pub mod actions {
    pub const CASE_CREATED: &str = "CASE_CREATED";
    pub const PAYMENT_CREATED: &str = "PAYMENT_CREATED";
    pub const STATUS_CHANGED: &str = "STATUS_CHANGED";
    pub const PAYMENT_REJECTED: &str = "PAYMENT_REJECTED";
    pub const OPERATOR_ASSIGNED: &str = "OPERATOR_ASSIGNED";
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    /// 1-based position in the subject's chain
    pub sequence: u64,
    pub actor: String,
    pub subject: String,
    pub action: String,
    pub before: Option<Value>,
    pub after: Value,
    pub created_at: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditLogEntry {
    pub(crate) fn generate_id() -> String {
        format!("AUD-{}", uuid::Uuid::new_v4().simple())
    }

    /// Value of `field` in the `after` snapshot
    pub fn after_field(&self, field: &str) -> Option<&Value> {
        self.after.get(field)
    }

    /// Value of `field` in the `before` snapshot
    pub fn before_field(&self, field: &str) -> Option<&Value> {
        self.before.as_ref().and_then(|before| before.get(field))
    }
}
