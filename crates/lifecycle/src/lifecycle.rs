//! Case lifecycle operations
//!
//! Each operation is one `CaseBook::transact`: the case change and its audit
//! entry commit together. Mirroring to collaborators happens later, from
//! the outbox, and never feeds back into this state.

use casepay_audit::{actions, AuditTrail};
use casepay_core::{
    Actor, ActorId, Case, CaseDetails, CaseId, CaseKind, CaseStatus, Payment, PaymentStatus,
    TransitionKind,
};
use casepay_policy::{authorize, Capability};
use casepay_store::{CaseBook, CaseRecord};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{LifecycleError, LifecycleResult};

pub struct CaseLifecycle {
    pub(crate) book: Arc<CaseBook>,
    pub(crate) audit: Arc<AuditTrail>,
}

/// Audit snapshot: the case's mutable state plus the payment a transition
/// expired, if any
fn status_snapshot(case: &Case, expired: Option<&Payment>) -> Value {
    let mut value = case.snapshot().to_value();
    if let Some(payment) = expired {
        value["payment"] = json!({
            "id": payment.id(),
            "order_ref": payment.order_ref(),
            "status": payment.status(),
        });
    }
    value
}

fn log_transition(case_id: &CaseId, from: CaseStatus, to: CaseStatus, actor: &ActorId) {
    tracing::info!(
        case_id = %case_id,
        from = %from,
        to = %to,
        actor = %actor,
        "case status changed"
    );
}

impl CaseLifecycle {
    pub fn new(book: Arc<CaseBook>, audit: Arc<AuditTrail>) -> Self {
        Self { book, audit }
    }

    pub fn book(&self) -> &Arc<CaseBook> {
        &self.book
    }

    /// Open a case in `DRAFT` / `PENDING` for `owner`
    pub fn create_case(
        &self,
        actor: &Actor,
        owner: ActorId,
        kind: CaseKind,
        details: CaseDetails,
    ) -> LifecycleResult<Case> {
        if details.title.trim().is_empty() {
            return Err(LifecycleError::EmptyTitle);
        }
        if kind == CaseKind::SaleListing && details.asking_price.is_none() {
            return Err(LifecycleError::MissingAskingPrice);
        }

        let case = Case::new(owner, kind, details, Utc::now());

        let mut after = case.snapshot().to_value();
        after["kind"] = json!(case.kind);
        after["owner"] = json!(case.owner);

        self.book.insert_case_with(case.clone(), |record| -> LifecycleResult<()> {
            self.audit.append_at(
                actor.id.as_str(),
                record.case.id.as_str(),
                actions::CASE_CREATED,
                None,
                Some(after),
                record.case.created_at,
            )?;
            Ok(())
        })?;

        tracing::info!(case_id = %case.id, owner = %case.owner, kind = %case.kind, "case created");
        Ok(case)
    }

    /// Staff status edit, checked against the adjacency table
    ///
    /// Moving a case to `REJECTED` also expires its pending payment so it
    /// can no longer be confirmed. Access is checked under the case lock.
    pub fn update_status(
        &self,
        case_id: &CaseId,
        next: CaseStatus,
        actor: &Actor,
    ) -> LifecycleResult<(CaseStatus, Case)> {
        let now = Utc::now();
        let (previous, case) = self.book.transact(case_id, |record| -> LifecycleResult<(CaseStatus, Case)> {
            authorize(actor, Capability::TransitionStatus, Some(&record.case))?;
            self.transition(record, next, &actor.id, now)
        })?;

        log_transition(case_id, previous, next, &actor.id);
        Ok((previous, case))
    }

    /// Transition under the case lock if `guard` accepts the committed case.
    /// `Ok(None)` when the guard declines; nothing is written then.
    pub(crate) fn apply_status(
        &self,
        case_id: &CaseId,
        next: CaseStatus,
        actor: &ActorId,
        now: DateTime<Utc>,
        guard: impl FnOnce(&Case) -> bool,
    ) -> LifecycleResult<Option<(CaseStatus, Case)>> {
        let applied = self.book.transact(case_id, |record| -> LifecycleResult<Option<(CaseStatus, Case)>> {
            if !guard(&record.case) {
                return Ok(None);
            }
            self.transition(record, next, actor, now).map(Some)
        })?;

        if let Some((previous, _)) = &applied {
            log_transition(case_id, *previous, next, actor);
        }
        Ok(applied)
    }

    /// Apply `next` to a working record and append its audit entry
    fn transition(
        &self,
        record: &mut CaseRecord,
        next: CaseStatus,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> LifecycleResult<(CaseStatus, Case)> {
        let current = record.case.status;
        match current.transition_to(next) {
            Some(TransitionKind::Staff) => {}
            Some(TransitionKind::PaymentConfirmation) | None => {
                tracing::warn!(
                    case_id = %record.case.id,
                    from = %current,
                    to = %next,
                    actor = %actor,
                    "transition refused"
                );
                return Err(LifecycleError::InvalidTransition {
                    from: current,
                    to: next,
                });
            }
        }

        let before = status_snapshot(&record.case, None);
        let mut expired = None;

        record.case.status = next;
        record.case.updated_at = now;
        if next == CaseStatus::Rejected {
            if let Some(pending) = record.pending_payment_mut() {
                pending.mark_expired(now).map_err(|_| LifecycleError::InvalidTransition {
                    from: current,
                    to: next,
                })?;
                expired = Some(pending.clone());
                record.case.payment_status = PaymentStatus::Expired;
            }
        }

        self.audit.append_at(
            actor.as_str(),
            record.case.id.as_str(),
            actions::STATUS_CHANGED,
            Some(before),
            Some(status_snapshot(&record.case, expired.as_ref())),
            now,
        )?;

        Ok((current, record.case.clone()))
    }

    /// Set the assigned operator. Returns the previous assignee and the
    /// updated case; assigning the current assignee writes nothing.
    pub fn assign_operator(
        &self,
        case_id: &CaseId,
        operator: ActorId,
        actor: &Actor,
    ) -> LifecycleResult<(Option<ActorId>, Case)> {
        let (previous, case, changed) = self.book.transact(case_id, |record| -> LifecycleResult<(Option<ActorId>, Case, bool)> {
            authorize(actor, Capability::AssignOperator, Some(&record.case))?;
            let case = &record.case;
            if case.status.is_terminal() {
                return Err(LifecycleError::CaseTerminal {
                    case_id: case.id.clone(),
                    status: case.status,
                });
            }

            let previous = record.case.assigned_operator.clone();
            if previous.as_ref() == Some(&operator) {
                return Ok((previous, record.case.clone(), false));
            }

            let now = Utc::now();
            record.case.assigned_operator = Some(operator.clone());
            record.case.updated_at = now;

            self.audit.append_at(
                actor.id.as_str(),
                record.case.id.as_str(),
                actions::OPERATOR_ASSIGNED,
                Some(json!({ "assigned_operator": previous })),
                Some(json!({ "assigned_operator": operator })),
                now,
            )?;

            Ok((previous, record.case.clone(), true))
        })?;

        if changed {
            tracing::info!(
                case_id = %case_id,
                operator = %operator,
                actor = %actor.id,
                "operator assigned"
            );
        }
        Ok((previous, case))
    }
}
