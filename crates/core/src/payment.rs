//! Payment - one payment attempt for a case
//!
//! `amount` is fixed at creation to `base_amount + unique_code` and is never
//! touched again. Only the status and the resolution metadata move, and only
//! out of `PENDING`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::{Amount, UniqueCode};
use crate::error::CoreError;
use crate::ids::{ActorId, CaseId, OrderRef, PaymentId};
use crate::status::PaymentStatus;

/// How a payment left `PENDING`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Confirmed {
        confirmed_at: DateTime<Utc>,
        confirmed_by: ActorId,
        notes: Option<String>,
    },
    Rejected {
        rejected_at: DateTime<Utc>,
        rejected_by: ActorId,
        notes: Option<String>,
    },
    Expired {
        expired_at: DateTime<Utc>,
    },
}

/// Structured payment payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    base_amount: Amount,
    unique_code: UniqueCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolution: Option<Resolution>,
}

impl PaymentPayload {
    pub fn base_amount(&self) -> Amount {
        self.base_amount
    }

    pub fn unique_code(&self) -> UniqueCode {
        self.unique_code
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    case_id: CaseId,
    provider: String,
    order_ref: OrderRef,
    amount: Amount,
    status: PaymentStatus,
    payload: PaymentPayload,
    created_at: DateTime<Utc>,
}

impl Payment {
    /// Create a `PENDING` payment for `base + code`
    pub fn new(
        case_id: CaseId,
        provider: impl Into<String>,
        base_amount: Amount,
        unique_code: UniqueCode,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let amount = base_amount.with_code(unique_code)?;
        Ok(Self {
            id: PaymentId::generate(),
            case_id,
            provider: provider.into(),
            order_ref: OrderRef::generate(),
            amount,
            status: PaymentStatus::Pending,
            payload: PaymentPayload {
                base_amount,
                unique_code,
                resolution: None,
            },
            created_at: now,
        })
    }

    pub fn id(&self) -> &PaymentId {
        &self.id
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn order_ref(&self) -> &OrderRef {
        &self.order_ref
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn payload(&self) -> &PaymentPayload {
        &self.payload
    }

    pub fn unique_code(&self) -> UniqueCode {
        self.payload.unique_code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    fn resolve(&mut self, status: PaymentStatus, resolution: Resolution) -> Result<(), CoreError> {
        if !self.is_pending() {
            return Err(CoreError::PaymentNotPending(self.status));
        }
        self.status = status;
        self.payload.resolution = Some(resolution);
        Ok(())
    }

    pub fn mark_paid(
        &mut self,
        by: ActorId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.resolve(
            PaymentStatus::Paid,
            Resolution::Confirmed {
                confirmed_at: at,
                confirmed_by: by,
                notes,
            },
        )
    }

    pub fn mark_rejected(
        &mut self,
        by: ActorId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.resolve(
            PaymentStatus::Rejected,
            Resolution::Rejected {
                rejected_at: at,
                rejected_by: by,
                notes,
            },
        )
    }

    pub fn mark_expired(&mut self, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.resolve(PaymentStatus::Expired, Resolution::Expired { expired_at: at })
    }
}
