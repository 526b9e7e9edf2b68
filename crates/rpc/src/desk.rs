//! Desk - wires every component together
//!
//! Flow for each operation:
//! ```text
//! request ──► RateLimiter::try_acquire ──► denied? RateLimited
//!                  │
//!                  ▼
//!             AccessPolicy ──► denied? Forbidden / NotFound
//!                  │
//!                  ▼
//!   CaseLifecycle / PaymentLedger (access re-check + mutation + audit,
//!                  one transaction under the case lock)
//!                  │
//!                  ▼
//!              Outbox::publish (post-commit, best effort)
//! ```

use casepay_audit::{AuditLogEntry, AuditTrail};
use casepay_bus::{DeskEvent, Outbox};
use casepay_core::{
    Actor, ActorId, Amount, Case, CaseDetails, CaseId, CaseKind, CaseStatus, OrderRef, Payment,
    PaymentId, UniqueCode,
};
use casepay_lifecycle::{CaseLifecycle, SweepSummary};
use casepay_payment::{Confirmation, CreatedPayment, PaymentLedger, SearchOutcome, UniqueCodeAllocator};
use casepay_policy::{
    authorize, authorize_create_case, validate_assignee, Capability, SharedSecret, Visibility,
};
use casepay_ratelimit::{Decision, LimitClass, RateLimiter, SweepReport};
use casepay_store::CaseBook;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::DeskConfig;
use crate::error::{ApiResult, DeskError, DeskResult};

/// A case with its payment attempts, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseView {
    #[serde(flatten)]
    pub case: Case,
    pub payments: Vec<Payment>,
}

pub struct Desk {
    config: DeskConfig,
    limiter: RateLimiter,
    book: Arc<CaseBook>,
    audit: Arc<AuditTrail>,
    ledger: PaymentLedger,
    lifecycle: CaseLifecycle,
    outbox: Outbox,
    mirror_secret: Option<SharedSecret>,
}

impl Desk {
    /// Desk with random unique codes
    pub fn new(config: DeskConfig, outbox: Outbox) -> DeskResult<Self> {
        let allocator =
            UniqueCodeAllocator::random(config.payments.code_min, config.payments.code_max)?;
        Self::with_allocator(config, allocator, outbox)
    }

    pub fn with_allocator(
        config: DeskConfig,
        allocator: UniqueCodeAllocator,
        outbox: Outbox,
    ) -> DeskResult<Self> {
        let audit = Arc::new(match &config.audit.journal_path {
            Some(path) => AuditTrail::open(path)?,
            None => AuditTrail::in_memory(),
        });
        let book = Arc::new(CaseBook::new());
        let ledger = PaymentLedger::new(
            Arc::clone(&book),
            Arc::clone(&audit),
            allocator,
            config.payments.clone(),
        );
        let lifecycle = CaseLifecycle::new(Arc::clone(&book), Arc::clone(&audit));

        tracing::info!(
            journal = audit.is_persistent(),
            outbox = outbox.is_enabled(),
            "desk ready"
        );

        Ok(Self {
            limiter: RateLimiter::new(config.rate_limits.clone()),
            mirror_secret: config.mirror_secret(),
            config,
            book,
            audit,
            ledger,
            lifecycle,
            outbox,
        })
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    /// Run one operation and convert its failure to the wire form
    fn respond<T>(
        &self,
        operation: &'static str,
        actor: &ActorId,
        f: impl FnOnce() -> DeskResult<T>,
    ) -> ApiResult<T> {
        f().map_err(|err| {
            tracing::debug!(operation, actor = %actor, tag = err.tag(), "request failed");
            err.into()
        })
    }

    fn admit(&self, actor: &ActorId, class: LimitClass) -> DeskResult<Decision> {
        Ok(self.limiter.try_acquire(actor.as_str(), class)?)
    }

    fn visible_case(&self, actor: &Actor, capability: Capability, case_id: &CaseId) -> DeskResult<Case> {
        let case = self.book.get(case_id)?;
        authorize(actor, capability, Some(&case))?;
        Ok(case)
    }

    /// Admission for a login attempt; the credential check itself is not
    /// part of the desk
    pub fn admit_login(&self, identity: &str) -> ApiResult<Decision> {
        let actor = ActorId::new(identity);
        self.respond("login", &actor, || self.admit(&actor, LimitClass::Login))
    }

    pub fn create_case(
        &self,
        actor: &Actor,
        owner: ActorId,
        kind: CaseKind,
        details: CaseDetails,
    ) -> ApiResult<Case> {
        self.respond("case_create", &actor.id, || {
            if details.attachments.is_empty() {
                self.admit(&actor.id, LimitClass::CaseCreate)?;
            } else {
                self.limiter
                    .try_acquire_all(actor.id.as_str(), &[LimitClass::CaseCreate, LimitClass::Upload])?;
            }
            authorize_create_case(actor, &owner)?;

            let case = self.lifecycle.create_case(actor, owner, kind, details)?;
            self.outbox.publish(DeskEvent::case_created(&case));
            Ok(case)
        })
    }

    /// Cases visible to the actor, oldest first
    pub fn list_cases(&self, actor: &Actor) -> ApiResult<Vec<Case>> {
        self.respond("case_list", &actor.id, || {
            self.admit(&actor.id, LimitClass::Api)?;
            authorize(actor, Capability::ReadCase, None)?;

            let visibility = Visibility::for_actor(actor);
            let mut cases = self.book.list_where(|case| visibility.matches(case));
            cases.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(cases)
        })
    }

    pub fn get_case(&self, actor: &Actor, case_id: &CaseId) -> ApiResult<CaseView> {
        self.respond("case_get", &actor.id, || {
            self.admit(&actor.id, LimitClass::Api)?;
            let record = self.book.snapshot(case_id)?;
            authorize(actor, Capability::ReadCase, Some(&record.case))?;
            Ok(CaseView {
                case: record.case,
                payments: record.payments,
            })
        })
    }

    pub fn create_payment(
        &self,
        actor: &Actor,
        case_id: &CaseId,
        base: Option<Amount>,
    ) -> ApiResult<CreatedPayment> {
        self.respond("payment_create", &actor.id, || {
            self.admit(&actor.id, LimitClass::PaymentCreate)?;
            let created = self.ledger.create_payment(case_id, base, actor)?;
            if created.created {
                self.outbox.publish(DeskEvent::payment_created(&created.payment));
            }
            Ok(created)
        })
    }

    /// Locate pending payments by observed transfer amount and the code as
    /// typed by the operator
    pub fn search_payments(
        &self,
        actor: &Actor,
        amount: Amount,
        code: &str,
        order_ref: Option<&OrderRef>,
    ) -> ApiResult<SearchOutcome> {
        self.respond("payment_search", &actor.id, || {
            self.admit(&actor.id, LimitClass::PaymentConfirm)?;
            authorize(actor, Capability::SearchPayments, None)?;
            let code: UniqueCode = code.parse()?;
            Ok(self.ledger.search(amount, code, order_ref)?)
        })
    }

    pub fn confirm_payment(
        &self,
        actor: &Actor,
        payment_id: &PaymentId,
        order_ref: &OrderRef,
        amount: Amount,
        code: &str,
        notes: Option<String>,
    ) -> ApiResult<Confirmation> {
        self.respond("payment_confirm", &actor.id, || {
            self.admit(&actor.id, LimitClass::PaymentConfirm)?;
            let code: UniqueCode = code.parse()?;

            let confirmation = self
                .ledger
                .confirm(payment_id, order_ref, amount, code, actor, notes)?;
            self.outbox.publish(DeskEvent::payment_confirmed(
                &confirmation.case,
                &confirmation.payment,
                &actor.id,
            ));
            Ok(confirmation)
        })
    }

    pub fn reject_payment(
        &self,
        actor: &Actor,
        payment_id: &PaymentId,
        order_ref: &OrderRef,
        notes: Option<String>,
    ) -> ApiResult<Payment> {
        self.respond("payment_reject", &actor.id, || {
            self.admit(&actor.id, LimitClass::PaymentConfirm)?;
            let payment = self.ledger.reject(payment_id, order_ref, actor, notes.clone())?;
            self.outbox
                .publish(DeskEvent::payment_rejected(&payment, &actor.id, notes));
            Ok(payment)
        })
    }

    pub fn update_status(&self, actor: &Actor, case_id: &CaseId, next: CaseStatus) -> ApiResult<Case> {
        self.respond("status_update", &actor.id, || {
            self.admit(&actor.id, LimitClass::Api)?;
            let (previous, case) = self.lifecycle.update_status(case_id, next, actor)?;
            self.outbox
                .publish(DeskEvent::status_changed(case_id, previous, case.status, &actor.id));
            Ok(case)
        })
    }

    pub fn assign_operator(&self, actor: &Actor, case_id: &CaseId, assignee: &Actor) -> ApiResult<Case> {
        self.respond("assign_operator", &actor.id, || {
            self.admit(&actor.id, LimitClass::Api)?;
            authorize(actor, Capability::AssignOperator, None)?;
            validate_assignee(assignee)?;

            let (previous, case) = self
                .lifecycle
                .assign_operator(case_id, assignee.id.clone(), actor)?;
            if previous.as_ref() != Some(&assignee.id) {
                self.outbox.publish(DeskEvent::operator_assigned(
                    case_id,
                    previous,
                    &assignee.id,
                    &actor.id,
                ));
            }
            Ok(case)
        })
    }

    /// Audit entries for one case, oldest first
    pub fn list_audit(&self, actor: &Actor, case_id: &CaseId) -> ApiResult<Vec<AuditLogEntry>> {
        self.respond("audit_list", &actor.id, || {
            self.admit(&actor.id, LimitClass::Api)?;
            self.visible_case(actor, Capability::ReadAudit, case_id)?;
            Ok(self.audit.list_by_subject(case_id.as_str()))
        })
    }

    /// Recompute one case's audit chain; returns the number of entries checked
    pub fn verify_audit(&self, actor: &Actor, case_id: &CaseId) -> ApiResult<usize> {
        self.respond("audit_verify", &actor.id, || {
            self.visible_case(actor, Capability::ReadAudit, case_id)?;
            Ok(self.audit.verify_subject(case_id.as_str())?)
        })
    }

    /// Check the credential presented by the spreadsheet mirror
    pub fn verify_mirror_secret(&self, provided: &str) -> ApiResult<()> {
        self.respond("mirror_verify", &ActorId::new("sheet_mirror"), || {
            let secret = self.mirror_secret.as_ref().ok_or(DeskError::SecretNotConfigured)?;
            secret.verify(provided).map_err(|err| {
                tracing::warn!("mirror secret rejected");
                DeskError::from(err)
            })
        })
    }

    /// Hard-block an identity for the configured block duration
    pub fn block(&self, actor: &Actor, identity: &str) -> ApiResult<DateTime<Utc>> {
        self.respond("block", &actor.id, || {
            authorize(actor, Capability::ManageLimits, None)?;
            let until = self.limiter.block(identity);
            tracing::warn!(identity, until = %until, actor = %actor.id, "identity blocked");
            Ok(until)
        })
    }

    /// Returns whether a block was lifted
    pub fn unblock(&self, actor: &Actor, identity: &str) -> ApiResult<bool> {
        self.respond("unblock", &actor.id, || {
            authorize(actor, Capability::ManageLimits, None)?;
            let lifted = self.limiter.unblock(identity);
            tracing::info!(identity, lifted, actor = %actor.id, "identity unblocked");
            Ok(lifted)
        })
    }

    /// Cancel stale drafts as of `now`
    pub fn run_retention_sweep(&self, now: DateTime<Utc>) -> SweepSummary {
        let summary = self
            .lifecycle
            .run_retention_sweep(now, self.config.retention.max_age());
        let system = ActorId::system();
        for case_id in &summary.cancelled {
            self.outbox.publish(DeskEvent::status_changed(
                case_id,
                CaseStatus::Draft,
                CaseStatus::Rejected,
                &system,
            ));
        }
        summary
    }

    /// Purge expired rate limit state
    pub fn sweep_limiter(&self) -> SweepReport {
        let report = self.limiter.sweep();
        tracing::debug!(
            timestamps = report.timestamps_purged,
            windows = report.windows_dropped,
            blocks = report.blocks_expired,
            "rate limiter swept"
        );
        report
    }
}
