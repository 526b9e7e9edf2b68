//! Desk events published after commit

use casepay_core::{
    ActorId, Amount, Attachment, Case, CaseId, CaseKind, CaseStatus, OrderRef, Payment, PaymentId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events emitted by the desk once a mutation and its audit entry are committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeskEvent {
    CaseCreated {
        case_id: CaseId,
        owner: ActorId,
        kind: CaseKind,
        title: String,
        timestamp: DateTime<Utc>,
    },

    PaymentCreated {
        case_id: CaseId,
        payment_id: PaymentId,
        order_ref: OrderRef,
        amount: Amount,
        timestamp: DateTime<Utc>,
    },

    /// Carries the staged attachments so the archiver needs no read-back
    PaymentConfirmed {
        case_id: CaseId,
        payment_id: PaymentId,
        order_ref: OrderRef,
        amount: Amount,
        title: String,
        confirmed_by: ActorId,
        attachments: Vec<Attachment>,
        timestamp: DateTime<Utc>,
    },

    PaymentRejected {
        case_id: CaseId,
        payment_id: PaymentId,
        order_ref: OrderRef,
        rejected_by: ActorId,
        notes: Option<String>,
        timestamp: DateTime<Utc>,
    },

    StatusChanged {
        case_id: CaseId,
        from: CaseStatus,
        to: CaseStatus,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },

    OperatorAssigned {
        case_id: CaseId,
        previous: Option<ActorId>,
        operator: ActorId,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },
}

impl DeskEvent {
    pub fn case_created(case: &Case) -> Self {
        Self::CaseCreated {
            case_id: case.id.clone(),
            owner: case.owner.clone(),
            kind: case.kind,
            title: case.details.title.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn payment_created(payment: &Payment) -> Self {
        Self::PaymentCreated {
            case_id: payment.case_id().clone(),
            payment_id: payment.id().clone(),
            order_ref: payment.order_ref().clone(),
            amount: payment.amount(),
            timestamp: Utc::now(),
        }
    }

    pub fn payment_confirmed(case: &Case, payment: &Payment, confirmed_by: &ActorId) -> Self {
        Self::PaymentConfirmed {
            case_id: case.id.clone(),
            payment_id: payment.id().clone(),
            order_ref: payment.order_ref().clone(),
            amount: payment.amount(),
            title: case.details.title.clone(),
            confirmed_by: confirmed_by.clone(),
            attachments: case.details.attachments.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn payment_rejected(payment: &Payment, rejected_by: &ActorId, notes: Option<String>) -> Self {
        Self::PaymentRejected {
            case_id: payment.case_id().clone(),
            payment_id: payment.id().clone(),
            order_ref: payment.order_ref().clone(),
            rejected_by: rejected_by.clone(),
            notes,
            timestamp: Utc::now(),
        }
    }

    pub fn status_changed(case_id: &CaseId, from: CaseStatus, to: CaseStatus, actor: &ActorId) -> Self {
        Self::StatusChanged {
            case_id: case_id.clone(),
            from,
            to,
            actor: actor.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn operator_assigned(
        case_id: &CaseId,
        previous: Option<ActorId>,
        operator: &ActorId,
        actor: &ActorId,
    ) -> Self {
        Self::OperatorAssigned {
            case_id: case_id.clone(),
            previous,
            operator: operator.clone(),
            actor: actor.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn case_id(&self) -> &CaseId {
        match self {
            DeskEvent::CaseCreated { case_id, .. }
            | DeskEvent::PaymentCreated { case_id, .. }
            | DeskEvent::PaymentConfirmed { case_id, .. }
            | DeskEvent::PaymentRejected { case_id, .. }
            | DeskEvent::StatusChanged { case_id, .. }
            | DeskEvent::OperatorAssigned { case_id, .. } => case_id,
        }
    }

    /// Stable name, matching the serialized `event` tag
    pub fn name(&self) -> &'static str {
        match self {
            DeskEvent::CaseCreated { .. } => "CASE_CREATED",
            DeskEvent::PaymentCreated { .. } => "PAYMENT_CREATED",
            DeskEvent::PaymentConfirmed { .. } => "PAYMENT_CONFIRMED",
            DeskEvent::PaymentRejected { .. } => "PAYMENT_REJECTED",
            DeskEvent::StatusChanged { .. } => "STATUS_CHANGED",
            DeskEvent::OperatorAssigned { .. } => "OPERATOR_ASSIGNED",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DeskEvent::CaseCreated { timestamp, .. }
            | DeskEvent::PaymentCreated { timestamp, .. }
            | DeskEvent::PaymentConfirmed { timestamp, .. }
            | DeskEvent::PaymentRejected { timestamp, .. }
            | DeskEvent::StatusChanged { timestamp, .. }
            | DeskEvent::OperatorAssigned { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tag_matches_name() {
        let event = DeskEvent::status_changed(
            &CaseId::new("CASE-1"),
            CaseStatus::Received,
            CaseStatus::InReview,
            &ActorId::new("op-1"),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
        assert_eq!(value["from"], "RECEIVED");
        assert_eq!(value["to"], "IN_REVIEW");

        let back: DeskEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.case_id().as_str(), "CASE-1");
    }
}
