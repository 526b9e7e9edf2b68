//! Payment ledger
//!
//! Every operation runs inside one `CaseBook::transact` on the owning case,
//! so the payment, the case and the audit entry commit together or not at
//! all, and concurrent calls on the same payment serialize. Access is
//! authorized against the case as committed under that same lock.

use casepay_audit::{actions, AuditTrail};
use casepay_core::{
    Actor, Amount, Case, CaseId, CaseStatus, OrderRef, Payment, PaymentId, PaymentStatus,
    TransitionKind, UniqueCode,
};
use casepay_policy::{authorize, Capability};
use casepay_store::{CaseBook, CaseRecord, StoreError};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::allocator::UniqueCodeAllocator;
use crate::config::PaymentConfig;
use crate::error::{PaymentError, PaymentResult};

/// Result of `create_payment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPayment {
    pub payment: Payment,
    /// False when an existing pending payment was returned
    pub created: bool,
}

/// Result of a successful `confirm`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub payment: Payment,
    pub case: Case,
}

/// Result of `search`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "match", content = "payments", rename_all = "snake_case")]
pub enum SearchOutcome {
    Unique(Payment),
    /// Several pending payments share amount and code; the operator picks
    /// one by order reference
    Ambiguous(Vec<Payment>),
}

impl SearchOutcome {
    pub fn candidates(&self) -> Vec<&Payment> {
        match self {
            SearchOutcome::Unique(payment) => vec![payment],
            SearchOutcome::Ambiguous(payments) => payments.iter().collect(),
        }
    }
}

/// Audit snapshot: the case's mutable state plus the payment it concerns
fn snapshot(case: &Case, payment: Option<&Payment>) -> Value {
    let mut value = case.snapshot().to_value();
    if let Some(payment) = payment {
        value["payment"] = json!({
            "id": payment.id(),
            "order_ref": payment.order_ref(),
            "amount": payment.amount(),
            "unique_code": payment.unique_code(),
            "status": payment.status(),
        });
    }
    value
}

fn payment_in<'a>(record: &'a mut CaseRecord, id: &PaymentId) -> PaymentResult<&'a mut Payment> {
    record
        .payment_mut(id)
        .ok_or_else(|| StoreError::PaymentNotFound(id.clone()).into())
}

/// Shared checks for confirm and reject
fn check_resolvable(payment: &Payment, order_ref: &OrderRef, actor: &Actor) -> PaymentResult<()> {
    if payment.order_ref() != order_ref {
        tracing::error!(
            target: "casepay::fraud",
            payment_id = %payment.id(),
            case_id = %payment.case_id(),
            actor = %actor.id,
            supplied_order = %order_ref,
            "order reference mismatch on payment resolution"
        );
        return Err(PaymentError::OrderMismatch(payment.id().clone()));
    }

    if !payment.is_pending() {
        tracing::warn!(
            payment_id = %payment.id(),
            status = %payment.status(),
            actor = %actor.id,
            "payment already resolved"
        );
        return Err(PaymentError::InvalidStatus {
            payment_id: payment.id().clone(),
            status: payment.status(),
        });
    }

    Ok(())
}

pub struct PaymentLedger {
    book: Arc<CaseBook>,
    audit: Arc<AuditTrail>,
    allocator: UniqueCodeAllocator,
    config: PaymentConfig,
}

impl PaymentLedger {
    pub fn new(
        book: Arc<CaseBook>,
        audit: Arc<AuditTrail>,
        allocator: UniqueCodeAllocator,
        config: PaymentConfig,
    ) -> Self {
        Self {
            book,
            audit,
            allocator,
            config,
        }
    }

    /// Ledger with random codes drawn from the configured range
    pub fn from_config(
        book: Arc<CaseBook>,
        audit: Arc<AuditTrail>,
        config: PaymentConfig,
    ) -> PaymentResult<Self> {
        let allocator = UniqueCodeAllocator::random(config.code_min, config.code_max)?;
        Ok(Self::new(book, audit, allocator, config))
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    fn taken_codes(&self, base: Amount) -> HashSet<UniqueCode> {
        self.book
            .payments_with_base(base)
            .iter()
            .filter(|p| p.is_pending())
            .map(Payment::unique_code)
            .collect()
    }

    /// Open a payment attempt for a case waiting for payment
    ///
    /// Idempotent: while the case has a pending payment, that payment is
    /// returned and nothing is written. `base` defaults to the case's asking
    /// price.
    pub fn create_payment(
        &self,
        case_id: &CaseId,
        base: Option<Amount>,
        actor: &Actor,
    ) -> PaymentResult<CreatedPayment> {
        let current = self.book.snapshot(case_id)?;
        authorize(actor, Capability::CreatePayment, Some(&current.case))?;
        if let Some(existing) = current.pending_payment() {
            if current.case.awaiting_payment() {
                return Ok(CreatedPayment {
                    payment: existing.clone(),
                    created: false,
                });
            }
        }

        let base = base
            .or(current.case.details.asking_price)
            .ok_or_else(|| PaymentError::MissingBaseAmount(case_id.clone()))?;

        // Taken codes are read outside the transaction so no second case
        // lock is taken while this one is held.
        let taken = self.taken_codes(base);
        let code = self
            .allocator
            .allocate_avoiding(&taken, self.config.unique_code_attempts);

        let outcome = self.book.transact(case_id, |record| -> PaymentResult<CreatedPayment> {
            authorize(actor, Capability::CreatePayment, Some(&record.case))?;
            let case = &record.case;
            if !case.awaiting_payment() {
                return Err(PaymentError::CaseNotAwaitingPayment {
                    case_id: case.id.clone(),
                    status: case.status,
                    payment_status: case.payment_status,
                });
            }

            // A concurrent create may have committed since the snapshot.
            if let Some(existing) = record.pending_payment() {
                return Ok(CreatedPayment {
                    payment: existing.clone(),
                    created: false,
                });
            }

            let now = Utc::now();
            let before = snapshot(&record.case, None);
            let payment = Payment::new(
                record.case.id.clone(),
                self.config.provider.clone(),
                base,
                code,
                now,
            )?;

            record.case.payment_status = PaymentStatus::Pending;
            record.case.updated_at = now;
            record.payments.push(payment.clone());

            self.audit.append_at(
                actor.id.as_str(),
                record.case.id.as_str(),
                actions::PAYMENT_CREATED,
                Some(before),
                Some(snapshot(&record.case, Some(&payment))),
                now,
            )?;

            Ok(CreatedPayment {
                payment,
                created: true,
            })
        })?;

        if outcome.created {
            tracing::info!(
                case_id = %case_id,
                payment_id = %outcome.payment.id(),
                amount = %outcome.payment.amount(),
                code = %outcome.payment.unique_code(),
                collided = taken.contains(&code),
                "payment created"
            );
        }

        Ok(outcome)
    }

    /// Locate the pending payment a bank transfer corresponds to
    ///
    /// Matches exact amount AND the code stored in the payload. An order
    /// reference, when given, narrows the match further.
    pub fn search(
        &self,
        amount: Amount,
        code: UniqueCode,
        order_ref: Option<&OrderRef>,
    ) -> PaymentResult<SearchOutcome> {
        let mut candidates: Vec<Payment> = self
            .book
            .payments_with_amount(amount)
            .into_iter()
            .filter(|p| p.is_pending())
            .filter(|p| p.unique_code() == code)
            .filter(|p| order_ref.map_or(true, |order| p.order_ref() == order))
            .collect();
        candidates.sort_by(|a, b| a.created_at().cmp(&b.created_at()));

        match candidates.len() {
            0 => Err(PaymentError::NoMatch { amount, code }),
            1 => Ok(SearchOutcome::Unique(candidates.remove(0))),
            n => {
                tracing::warn!(amount = %amount, code = %code, candidates = n, "ambiguous payment search");
                Ok(SearchOutcome::Ambiguous(candidates))
            }
        }
    }

    /// Confirm a pending payment; the only path from `DRAFT` to `RECEIVED`
    pub fn confirm(
        &self,
        payment_id: &PaymentId,
        order_ref: &OrderRef,
        amount: Amount,
        code: UniqueCode,
        actor: &Actor,
        notes: Option<String>,
    ) -> PaymentResult<Confirmation> {
        let confirmation = self.book.transact_payment(payment_id, |record| -> PaymentResult<Confirmation> {
            authorize(actor, Capability::ResolvePayment, Some(&record.case))?;
            let payment = payment_in(record, payment_id)?;
            check_resolvable(payment, order_ref, actor)?;

            if payment.amount() != amount {
                return Err(PaymentError::AmountMismatch {
                    expected: payment.amount(),
                    actual: amount,
                });
            }
            if payment.unique_code() != code {
                return Err(PaymentError::CodeMismatch {
                    expected: payment.unique_code(),
                    actual: code,
                });
            }

            let case = &record.case;
            if case.status.transition_to(CaseStatus::Received)
                != Some(TransitionKind::PaymentConfirmation)
            {
                return Err(PaymentError::CaseNotAwaitingPayment {
                    case_id: case.id.clone(),
                    status: case.status,
                    payment_status: case.payment_status,
                });
            }

            let now = Utc::now();
            let before = snapshot(&record.case, record.payment(payment_id));

            let payment = payment_in(record, payment_id)?;
            payment.mark_paid(actor.id.clone(), notes, now)?;
            let payment = payment.clone();

            record.case.payment_status = PaymentStatus::Paid;
            record.case.status = CaseStatus::Received;
            record.case.updated_at = now;

            self.audit.append_at(
                actor.id.as_str(),
                record.case.id.as_str(),
                actions::STATUS_CHANGED,
                Some(before),
                Some(snapshot(&record.case, Some(&payment))),
                now,
            )?;

            Ok(Confirmation {
                payment,
                case: record.case.clone(),
            })
        })?;

        tracing::info!(
            payment_id = %payment_id,
            case_id = %confirmation.case.id,
            actor = %actor.id,
            "payment confirmed, case received"
        );

        Ok(confirmation)
    }

    /// Reject a pending payment; the case goes back to `DRAFT` with
    /// `paymentStatus = REJECTED` so a new attempt can be opened
    pub fn reject(
        &self,
        payment_id: &PaymentId,
        order_ref: &OrderRef,
        actor: &Actor,
        notes: Option<String>,
    ) -> PaymentResult<Payment> {
        let payment = self.book.transact_payment(payment_id, |record| -> PaymentResult<Payment> {
            authorize(actor, Capability::ResolvePayment, Some(&record.case))?;
            check_resolvable(payment_in(record, payment_id)?, order_ref, actor)?;

            let now = Utc::now();
            let before = snapshot(&record.case, record.payment(payment_id));

            let payment = payment_in(record, payment_id)?;
            payment.mark_rejected(actor.id.clone(), notes, now)?;
            let payment = payment.clone();

            record.case.payment_status = PaymentStatus::Rejected;
            record.case.status = CaseStatus::Draft;
            record.case.updated_at = now;

            self.audit.append_at(
                actor.id.as_str(),
                record.case.id.as_str(),
                actions::PAYMENT_REJECTED,
                Some(before),
                Some(snapshot(&record.case, Some(&payment))),
                now,
            )?;

            Ok(payment)
        })?;

        tracing::info!(
            payment_id = %payment_id,
            case_id = %payment.case_id(),
            actor = %actor.id,
            "payment rejected"
        );

        Ok(payment)
    }

    pub fn get(&self, payment_id: &PaymentId) -> PaymentResult<Payment> {
        Ok(self.book.find_payment(payment_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::FixedCodes;
    use casepay_core::{ActorId, CaseDetails, CaseKind, ErrorKind};

    struct Fixture {
        book: Arc<CaseBook>,
        audit: Arc<AuditTrail>,
        ledger: PaymentLedger,
    }

    fn fixture(codes: &[u16]) -> Fixture {
        let book = Arc::new(CaseBook::new());
        let audit = Arc::new(AuditTrail::in_memory());
        let allocator = UniqueCodeAllocator::new(
            100,
            999,
            Arc::new(FixedCodes::new(codes.to_vec())),
        )
        .unwrap();
        let ledger = PaymentLedger::new(
            Arc::clone(&book),
            Arc::clone(&audit),
            allocator,
            PaymentConfig::default(),
        );
        Fixture { book, audit, ledger }
    }

    fn open_case(book: &CaseBook, details: CaseDetails) -> CaseId {
        let case = Case::new(ActorId::new("alice"), CaseKind::SupportTicket, details, Utc::now());
        let id = case.id.clone();
        book.insert_case(case).unwrap();
        id
    }

    fn code(value: u16) -> UniqueCode {
        UniqueCode::new(value).unwrap()
    }

    #[test]
    fn test_create_is_idempotent() {
        let f = fixture(&[187, 245]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let alice = Actor::customer("alice");

        let first = f.ledger.create_payment(&case_id, Some(Amount::new(50_000)), &alice).unwrap();
        let second = f.ledger.create_payment(&case_id, Some(Amount::new(50_000)), &alice).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.payment.id(), second.payment.id());
        assert_eq!(first.payment.amount(), Amount::new(50_187));
        assert_eq!(f.book.snapshot(&case_id).unwrap().payments.len(), 1);
        assert_eq!(f.audit.list_by_subject(case_id.as_str()).len(), 1);
    }

    #[test]
    fn test_create_defaults_to_asking_price() {
        let f = fixture(&[123]);
        let case_id = open_case(
            &f.book,
            CaseDetails::titled("Account").with_asking_price(Amount::new(75_000)),
        );
        let created = f.ledger.create_payment(&case_id, None, &Actor::customer("alice")).unwrap();
        assert_eq!(created.payment.amount(), Amount::new(75_123));
        assert_eq!(created.payment.payload().base_amount(), Amount::new(75_000));
    }

    #[test]
    fn test_create_without_base_refused() {
        let f = fixture(&[123]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let err = f.ledger.create_payment(&case_id, None, &Actor::customer("alice")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(f.audit.is_empty());
    }

    #[test]
    fn test_create_on_unknown_case() {
        let f = fixture(&[123]);
        let err = f
            .ledger
            .create_payment(&CaseId::new("CASE-404"), Some(Amount::new(1)), &Actor::customer("alice"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_search_and_confirm() {
        let f = fixture(&[187]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let created = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &Actor::customer("alice"))
            .unwrap()
            .payment;

        let found = f.ledger.search(Amount::new(50_187), code(187), None).unwrap();
        assert_eq!(found, SearchOutcome::Unique(created.clone()));

        let op = Actor::operator("op-1");
        let confirmation = f
            .ledger
            .confirm(created.id(), created.order_ref(), Amount::new(50_187), code(187), &op, None)
            .unwrap();

        assert_eq!(confirmation.payment.status(), PaymentStatus::Paid);
        assert_eq!(confirmation.payment.amount(), Amount::new(50_187));
        assert_eq!(confirmation.case.status, CaseStatus::Received);
        assert_eq!(confirmation.case.payment_status, PaymentStatus::Paid);

        let entries = f.audit.list_by_subject(case_id.as_str());
        let status_changes: Vec<_> = entries
            .iter()
            .filter(|e| e.action == actions::STATUS_CHANGED)
            .collect();
        assert_eq!(status_changes.len(), 1);
        assert_eq!(status_changes[0].before_field("status"), Some(&json!("DRAFT")));
        assert_eq!(status_changes[0].after_field("status"), Some(&json!("RECEIVED")));
        assert_eq!(status_changes[0].actor, "op-1");

        // a paid payment is no longer searchable
        assert!(f.ledger.search(Amount::new(50_187), code(187), None).is_err());
    }

    #[test]
    fn test_second_confirm_is_conflict() {
        let f = fixture(&[187]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let payment = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &Actor::customer("alice"))
            .unwrap()
            .payment;
        let op = Actor::operator("op-1");
        let confirm = || {
            f.ledger
                .confirm(payment.id(), payment.order_ref(), Amount::new(50_187), code(187), &op, None)
        };

        confirm().unwrap();
        let err = confirm().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.tag(), "InvalidStatus");
        assert_eq!(f.ledger.get(payment.id()).unwrap().status(), PaymentStatus::Paid);
        assert_eq!(f.audit.list_by_subject(case_id.as_str()).len(), 2);

        let err = f.ledger.reject(payment.id(), payment.order_ref(), &op, None).unwrap_err();
        assert_eq!(err.tag(), "InvalidStatus");
    }

    #[test]
    fn test_order_mismatch_is_conflict_and_changes_nothing() {
        let f = fixture(&[187]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let payment = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &Actor::customer("alice"))
            .unwrap()
            .payment;

        let err = f
            .ledger
            .confirm(
                payment.id(),
                &OrderRef::new("ORD-FORGED"),
                Amount::new(50_187),
                code(187),
                &Actor::operator("op-1"),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, PaymentError::OrderMismatch(_)));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(f.ledger.get(payment.id()).unwrap().is_pending());
        assert_eq!(f.book.get(&case_id).unwrap().status, CaseStatus::Draft);
    }

    #[test]
    fn test_resolution_rechecks_access_on_committed_case() {
        let f = fixture(&[187]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let payment = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &Actor::customer("alice"))
            .unwrap()
            .payment;

        f.book
            .transact::<_, PaymentError, _>(&case_id, |record| {
                record.case.assigned_operator = Some(ActorId::new("op-1"));
                Ok(())
            })
            .unwrap();

        let op2 = Actor::operator("op-2");
        let err = f
            .ledger
            .confirm(payment.id(), payment.order_ref(), payment.amount(), code(187), &op2, None)
            .unwrap_err();
        assert!(matches!(err, PaymentError::Policy(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f
            .ledger
            .reject(payment.id(), payment.order_ref(), &op2, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f
            .ledger
            .create_payment(&case_id, None, &Actor::customer("mallory"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!(f.ledger.get(payment.id()).unwrap().is_pending());
        assert_eq!(f.audit.list_by_subject(case_id.as_str()).len(), 1);
    }

    #[test]
    fn test_amount_and_code_mismatch() {
        let f = fixture(&[187]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let payment = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &Actor::customer("alice"))
            .unwrap()
            .payment;
        let op = Actor::operator("op-1");

        let err = f
            .ledger
            .confirm(payment.id(), payment.order_ref(), Amount::new(50_000), code(187), &op, None)
            .unwrap_err();
        assert_eq!(err.tag(), "AmountMismatch");

        let err = f
            .ledger
            .confirm(payment.id(), payment.order_ref(), Amount::new(50_187), code(188), &op, None)
            .unwrap_err();
        assert_eq!(err.tag(), "CodeMismatch");
        assert!(f.ledger.get(payment.id()).unwrap().is_pending());
    }

    #[test]
    fn test_unknown_payment() {
        let f = fixture(&[187]);
        let err = f
            .ledger
            .confirm(
                &PaymentId::new("PAY-404"),
                &OrderRef::new("ORD-1"),
                Amount::new(1),
                code(100),
                &Actor::operator("op-1"),
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_reject_then_retry() {
        let f = fixture(&[187, 245]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let alice = Actor::customer("alice");
        let first = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &alice)
            .unwrap()
            .payment;

        let rejected = f
            .ledger
            .reject(first.id(), first.order_ref(), &Actor::operator("op-1"), Some("no transfer seen".into()))
            .unwrap();
        assert_eq!(rejected.status(), PaymentStatus::Rejected);

        let case = f.book.get(&case_id).unwrap();
        assert_eq!(case.status, CaseStatus::Draft);
        assert_eq!(case.payment_status, PaymentStatus::Rejected);

        let retry = f.ledger.create_payment(&case_id, Some(Amount::new(50_000)), &alice).unwrap();
        assert!(retry.created);
        assert_ne!(retry.payment.id(), first.id());
        assert_eq!(retry.payment.amount(), Amount::new(50_245));
        assert_eq!(f.book.get(&case_id).unwrap().payment_status, PaymentStatus::Pending);

        let actions: Vec<_> = f
            .audit
            .list_by_subject(case_id.as_str())
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![actions::PAYMENT_CREATED, actions::PAYMENT_REJECTED, actions::PAYMENT_CREATED]
        );
    }

    #[test]
    fn test_paid_case_refuses_new_payment() {
        let f = fixture(&[187]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let alice = Actor::customer("alice");
        let payment = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &alice)
            .unwrap()
            .payment;
        f.ledger
            .confirm(payment.id(), payment.order_ref(), payment.amount(), code(187), &Actor::operator("op-1"), None)
            .unwrap();

        let err = f.ledger.create_payment(&case_id, Some(Amount::new(50_000)), &alice).unwrap_err();
        assert_eq!(err.tag(), "InvalidStatus");
    }

    #[test]
    fn test_ledger_avoids_pending_code_for_same_base() {
        let f = fixture(&[187, 187, 402]);
        let alice = Actor::customer("alice");
        let a = open_case(&f.book, CaseDetails::titled("A"));
        let b = open_case(&f.book, CaseDetails::titled("B"));

        let pa = f.ledger.create_payment(&a, Some(Amount::new(50_000)), &alice).unwrap().payment;
        let pb = f.ledger.create_payment(&b, Some(Amount::new(50_000)), &alice).unwrap().payment;
        assert_eq!(pa.unique_code().value(), 187);
        assert_eq!(pb.unique_code().value(), 402);
    }

    #[test]
    fn test_search_surfaces_collisions() {
        let f = fixture(&[187]);
        let alice = Actor::customer("alice");
        let ledger = PaymentLedger::new(
            Arc::clone(&f.book),
            Arc::clone(&f.audit),
            UniqueCodeAllocator::new(100, 999, Arc::new(FixedCodes::new([187]))).unwrap(),
            PaymentConfig {
                unique_code_attempts: 1,
                ..PaymentConfig::default()
            },
        );
        let a = open_case(&f.book, CaseDetails::titled("A"));
        let b = open_case(&f.book, CaseDetails::titled("B"));
        let pa = ledger.create_payment(&a, Some(Amount::new(50_000)), &alice).unwrap().payment;
        let pb = ledger.create_payment(&b, Some(Amount::new(50_000)), &alice).unwrap().payment;

        match ledger.search(Amount::new(50_187), code(187), None).unwrap() {
            SearchOutcome::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {:?}", other),
        }

        let narrowed = ledger
            .search(Amount::new(50_187), code(187), Some(pb.order_ref()))
            .unwrap();
        assert_eq!(narrowed.candidates(), vec![&pb]);
        assert_ne!(pa.id(), pb.id());
    }

    #[test]
    fn test_concurrent_confirms_exactly_one_wins() {
        let f = fixture(&[187]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let payment = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &Actor::customer("alice"))
            .unwrap()
            .payment;

        let results: Vec<PaymentResult<Confirmation>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|i| {
                    let ledger = &f.ledger;
                    let payment = &payment;
                    s.spawn(move || {
                        ledger.confirm(
                            payment.id(),
                            payment.order_ref(),
                            Amount::new(50_187),
                            code(187),
                            &Actor::operator(format!("op-{}", i).as_str()),
                            None,
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.tag(), "InvalidStatus");

        let status_changes = f
            .audit
            .list_by_subject(case_id.as_str())
            .into_iter()
            .filter(|e| e.action == actions::STATUS_CHANGED)
            .count();
        assert_eq!(status_changes, 1);
    }

    #[test]
    fn test_confirm_and_reject_race() {
        let f = fixture(&[187]);
        let case_id = open_case(&f.book, CaseDetails::titled("Help"));
        let payment = f
            .ledger
            .create_payment(&case_id, Some(Amount::new(50_000)), &Actor::customer("alice"))
            .unwrap()
            .payment;
        let op = Actor::operator("op-1");

        let (confirmed, rejected) = std::thread::scope(|s| {
            let c = s.spawn(|| {
                f.ledger
                    .confirm(payment.id(), payment.order_ref(), Amount::new(50_187), code(187), &op, None)
                    .is_ok()
            });
            let r = s.spawn(|| f.ledger.reject(payment.id(), payment.order_ref(), &op, None).is_ok());
            (c.join().unwrap(), r.join().unwrap())
        });

        assert!(confirmed ^ rejected);
        let case = f.book.get(&case_id).unwrap();
        if confirmed {
            assert_eq!(case.status, CaseStatus::Received);
        } else {
            assert_eq!(case.payment_status, PaymentStatus::Rejected);
        }
    }
}
