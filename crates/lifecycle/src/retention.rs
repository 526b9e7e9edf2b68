//! Retention of unpaid drafts
//!
//! [`should_cancel`] is the pure predicate; the scheduler that calls
//! [`CaseLifecycle::run_retention_sweep`] is owned by the caller.

use casepay_core::{ActorId, Case, CaseId, CaseStatus, PaymentStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleResult;
use crate::lifecycle::CaseLifecycle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Age after which an unpaid draft is cancelled
    #[serde(default = "default_max_draft_age_hours")]
    pub max_draft_age_hours: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_draft_age_hours() -> u64 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    15 * 60
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_draft_age_hours: default_max_draft_age_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl RetentionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::hours(i64::try_from(self.max_draft_age_hours).unwrap_or(i64::MAX / 3_600_000))
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// True iff the case is an unpaid draft strictly older than `max_age`
pub fn should_cancel(case: &Case, now: DateTime<Utc>, max_age: Duration) -> bool {
    case.status == CaseStatus::Draft
        && case.payment_status == PaymentStatus::Pending
        && now - case.created_at > max_age
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub cancelled: Vec<CaseId>,
    pub failed: Vec<CaseId>,
}

impl CaseLifecycle {
    /// Cancel one stale draft: `REJECTED`, pending payment `EXPIRED`, one
    /// `STATUS_CHANGED` entry by `system`. The predicate is re-evaluated
    /// under the case lock; `Ok(None)` means the case is no longer stale.
    pub fn cancel_stale(
        &self,
        case_id: &CaseId,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> LifecycleResult<Option<Case>> {
        let applied = self.apply_status(
            case_id,
            CaseStatus::Rejected,
            &ActorId::system(),
            now,
            |case| should_cancel(case, now, max_age),
        )?;
        Ok(applied.map(|(_, case)| case))
    }

    /// Evaluate the predicate over every open case and cancel the stale ones
    pub fn run_retention_sweep(&self, now: DateTime<Utc>, max_age: Duration) -> SweepSummary {
        let candidates = self
            .book
            .list_where(|case| case.status == CaseStatus::Draft);

        let mut summary = SweepSummary {
            examined: candidates.len(),
            ..SweepSummary::default()
        };

        for case in candidates.iter().filter(|case| should_cancel(case, now, max_age)) {
            match self.cancel_stale(&case.id, now, max_age) {
                Ok(Some(_)) => summary.cancelled.push(case.id.clone()),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(case_id = %case.id, error = %err, "retention cancel failed");
                    summary.failed.push(case.id.clone());
                }
            }
        }

        tracing::info!(
            examined = summary.examined,
            cancelled = summary.cancelled.len(),
            failed = summary.failed.len(),
            "retention sweep finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casepay_audit::{actions, AuditTrail};
    use casepay_core::{Actor, Amount, CaseDetails, CaseKind, UniqueCode};
    use casepay_payment::{FixedCodes, PaymentConfig, PaymentLedger, UniqueCodeAllocator};
    use casepay_store::CaseBook;
    use std::sync::Arc;

    fn setup() -> (CaseLifecycle, PaymentLedger, Arc<AuditTrail>) {
        let book = Arc::new(CaseBook::new());
        let audit = Arc::new(AuditTrail::in_memory());
        let ledger = PaymentLedger::new(
            Arc::clone(&book),
            Arc::clone(&audit),
            UniqueCodeAllocator::new(100, 999, Arc::new(FixedCodes::new([421, 422]))).unwrap(),
            PaymentConfig::default(),
        );
        (CaseLifecycle::new(book, Arc::clone(&audit)), ledger, audit)
    }

    fn open_draft(lifecycle: &CaseLifecycle, ledger: &PaymentLedger, title: &str) -> Case {
        let alice = Actor::customer("alice");
        let case = lifecycle
            .create_case(&alice, ActorId::new("alice"), CaseKind::SupportTicket, CaseDetails::titled(title))
            .unwrap();
        ledger
            .create_payment(&case.id, Some(Amount::new(75_000)), &alice)
            .unwrap();
        case
    }

    #[test]
    fn test_should_cancel_boundary() {
        let created = Utc::now();
        let case = Case::new(
            ActorId::new("alice"),
            CaseKind::SupportTicket,
            CaseDetails::titled("Refund"),
            created,
        );
        let max_age = Duration::hours(24);

        assert!(!should_cancel(&case, created + max_age, max_age));
        assert!(should_cancel(&case, created + max_age + Duration::milliseconds(1), max_age));

        let mut paid = case.clone();
        paid.payment_status = PaymentStatus::Paid;
        assert!(!should_cancel(&paid, created + Duration::days(3), max_age));

        let mut reviewed = case;
        reviewed.status = CaseStatus::InReview;
        assert!(!should_cancel(&reviewed, created + Duration::days(3), max_age));
    }

    #[test]
    fn test_default_config() {
        let config = RetentionConfig::default();
        assert_eq!(config.max_age(), Duration::hours(24));
        assert_eq!(config.sweep_interval(), std::time::Duration::from_secs(900));

        let parsed: RetentionConfig = serde_json::from_str(r#"{"max_draft_age_hours": 2}"#).unwrap();
        assert_eq!(parsed.max_age(), Duration::hours(2));
        assert_eq!(parsed.sweep_interval_secs, 900);
    }

    #[test]
    fn test_sweep_cancels_stale_drafts_only() {
        let (lifecycle, ledger, audit) = setup();
        let stale = open_draft(&lifecycle, &ledger, "Never paid");
        let paid = open_draft(&lifecycle, &ledger, "Paid on time");

        let payment = lifecycle.book().snapshot(&paid.id).unwrap().pending_payment().cloned().unwrap();
        ledger
            .confirm(
                payment.id(),
                payment.order_ref(),
                payment.amount(),
                UniqueCode::new(422).unwrap(),
                &Actor::operator("op-1"),
                None,
            )
            .unwrap();

        let later = Utc::now() + Duration::hours(25);
        let summary = lifecycle.run_retention_sweep(later, Duration::hours(24));
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.cancelled, vec![stale.id.clone()]);
        assert!(summary.failed.is_empty());

        let record = lifecycle.book().snapshot(&stale.id).unwrap();
        assert_eq!(record.case.status, CaseStatus::Rejected);
        assert_eq!(record.case.payment_status, PaymentStatus::Expired);
        assert_eq!(record.latest_payment().unwrap().status(), PaymentStatus::Expired);

        let entry = audit.list_by_subject(stale.id.as_str()).pop().unwrap();
        assert_eq!(entry.actor, "system");
        assert_eq!(entry.action, actions::STATUS_CHANGED);
        assert_eq!(entry.before_field("status"), Some(&serde_json::json!("DRAFT")));
        assert_eq!(entry.after_field("status"), Some(&serde_json::json!("REJECTED")));
        assert_eq!(entry.after_field("payment_status"), Some(&serde_json::json!("EXPIRED")));
        assert_eq!(audit.verify_subject(stale.id.as_str()).unwrap(), 3);

        assert_eq!(lifecycle.book().get(&paid.id).unwrap().status, CaseStatus::Received);

        let again = lifecycle.run_retention_sweep(later, Duration::hours(24));
        assert_eq!(again.examined, 0);
        assert!(again.cancelled.is_empty());
    }

    #[test]
    fn test_cancel_stale_skips_fresh_case() {
        let (lifecycle, ledger, audit) = setup();
        let case = open_draft(&lifecycle, &ledger, "Fresh");

        let outcome = lifecycle
            .cancel_stale(&case.id, Utc::now(), Duration::hours(24))
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(lifecycle.book().get(&case.id).unwrap().status, CaseStatus::Draft);
        assert_eq!(audit.list_by_subject(case.id.as_str()).len(), 2);
    }
}
