//! Case - the paid work item (support ticket or sale listing)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::amount::Amount;
use crate::ids::{ActorId, CaseId};
use crate::status::{CaseStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseKind {
    SupportTicket,
    /// Sale of an account credential; carries an asking price
    SaleListing,
}

/// File staged with the case, uploaded to document storage once paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub content_base64: String,
}

/// Free-form descriptive fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDetails {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Asking price for sale listings, used as the default base amount
    #[serde(default)]
    pub asking_price: Option<Amount>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl CaseDetails {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_asking_price(mut self, price: Amount) -> Self {
        self.asking_price = Some(price);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub kind: CaseKind,
    pub owner: ActorId,
    pub status: CaseStatus,
    pub payment_status: PaymentStatus,
    pub assigned_operator: Option<ActorId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub details: CaseDetails,
}

impl Case {
    /// New case in `DRAFT` / `PENDING`
    pub fn new(owner: ActorId, kind: CaseKind, details: CaseDetails, now: DateTime<Utc>) -> Self {
        Self {
            id: CaseId::generate(),
            kind,
            owner,
            status: CaseStatus::Draft,
            payment_status: PaymentStatus::Pending,
            assigned_operator: None,
            created_at: now,
            updated_at: now,
            details,
        }
    }

    /// Still waiting for a payment to be confirmed
    pub fn awaiting_payment(&self) -> bool {
        self.status == CaseStatus::Draft && self.payment_status != PaymentStatus::Paid
    }

    pub fn snapshot(&self) -> CaseSnapshot {
        CaseSnapshot {
            status: self.status,
            payment_status: self.payment_status,
            assigned_operator: self.assigned_operator.clone(),
        }
    }
}

/// The mutable part of a case, as recorded in audit `before`/`after`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub status: CaseStatus,
    pub payment_status: PaymentStatus,
    pub assigned_operator: Option<ActorId>,
}

impl CaseSnapshot {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "payment_status": self.payment_status,
            "assigned_operator": self.assigned_operator,
        })
    }
}
