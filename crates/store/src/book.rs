//! In-memory case book
//!
//! Lock order: a record lock may be held while taking an index lock, never
//! the other way round. Index readers copy ids out and release the index
//! before touching records.

use casepay_core::{Amount, Case, CaseId, OrderRef, Payment, PaymentId};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::record::CaseRecord;

type Record = Arc<Mutex<CaseRecord>>;

#[derive(Default)]
struct Indexes {
    case_of_payment: HashMap<PaymentId, CaseId>,
    payment_of_order: HashMap<OrderRef, PaymentId>,
    by_amount: HashMap<Amount, BTreeSet<PaymentId>>,
    by_base: HashMap<Amount, BTreeSet<PaymentId>>,
}

impl Indexes {
    fn add(&mut self, payment: &Payment) {
        self.case_of_payment
            .insert(payment.id().clone(), payment.case_id().clone());
        self.payment_of_order
            .insert(payment.order_ref().clone(), payment.id().clone());
        self.by_amount
            .entry(payment.amount())
            .or_default()
            .insert(payment.id().clone());
        self.by_base
            .entry(payment.payload().base_amount())
            .or_default()
            .insert(payment.id().clone());
    }
}

#[derive(Default)]
pub struct CaseBook {
    records: RwLock<HashMap<CaseId, Record>>,
    indexes: RwLock<Indexes>,
}

impl CaseBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: &CaseId) -> StoreResult<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::CaseNotFound(id.clone()))
    }

    fn all_records(&self) -> Vec<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Store a new case
    pub fn insert_case(&self, case: Case) -> StoreResult<()> {
        self.insert_case_with(case, |_| Ok::<_, StoreError>(()))
    }

    /// Store a new case if `f` succeeds on its initial record. The case is
    /// not visible to other callers until then.
    ///
    /// `f` runs without any book lock held, so slow work in it (a journal
    /// write) does not stall other cases. The id is checked before and after;
    /// only a concurrent insert of the very same id can fail the second check.
    pub fn insert_case_with<T, E, F>(&self, case: Case, f: F) -> Result<T, E>
    where
        F: FnOnce(&CaseRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        if self.contains(&case.id) {
            return Err(StoreError::DuplicateCase(case.id).into());
        }

        let record = CaseRecord::new(case);
        let out = f(&record)?;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.entry(record.case.id.clone()) {
            Entry::Occupied(_) => {
                tracing::error!(case_id = %record.case.id, "case id inserted concurrently");
                Err(StoreError::DuplicateCase(record.case.id).into())
            }
            Entry::Vacant(slot) => {
                tracing::debug!(case_id = %record.case.id, "case stored");
                slot.insert(Arc::new(Mutex::new(record)));
                Ok(out)
            }
        }
    }

    pub fn contains(&self, id: &CaseId) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Committed copy of a case
    pub fn get(&self, id: &CaseId) -> StoreResult<Case> {
        Ok(self.snapshot(id)?.case)
    }

    /// Committed copy of a case and its payments
    pub fn snapshot(&self, id: &CaseId) -> StoreResult<CaseRecord> {
        let record = self.record(id)?;
        let record = record.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(record.clone())
    }

    /// Every case, oldest first
    pub fn list(&self) -> Vec<Case> {
        self.list_where(|_| true)
    }

    pub fn list_where(&self, mut keep: impl FnMut(&Case) -> bool) -> Vec<Case> {
        let mut cases: Vec<Case> = self
            .all_records()
            .iter()
            .filter_map(|record| {
                let record = record.lock().unwrap_or_else(PoisonError::into_inner);
                keep(&record.case).then(|| record.case.clone())
            })
            .collect();
        cases.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        cases
    }

    /// Run `f` against a working copy of the record and commit it only if
    /// `f` returns `Ok`. Calls for the same case serialize; calls for other
    /// cases are unaffected.
    pub fn transact<T, E, F>(&self, id: &CaseId, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut CaseRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        let record = self.record(id)?;
        let mut committed = record.lock().unwrap_or_else(PoisonError::into_inner);

        let mut working = committed.clone();
        let known = committed.payments.len();
        let out = f(&mut working)?;

        if working.payments.len() > known {
            let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
            for payment in &working.payments[known..] {
                indexes.add(payment);
            }
        }
        *committed = working;

        Ok(out)
    }

    /// Case owning a payment
    pub fn case_of_payment(&self, id: &PaymentId) -> StoreResult<CaseId> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .case_of_payment
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::PaymentNotFound(id.clone()))
    }

    /// [`transact`](Self::transact) on the case owning `payment_id`
    pub fn transact_payment<T, E, F>(&self, payment_id: &PaymentId, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut CaseRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        let case_id = self.case_of_payment(payment_id)?;
        self.transact(&case_id, f)
    }

    /// Committed copy of one payment
    pub fn find_payment(&self, id: &PaymentId) -> StoreResult<Payment> {
        let case_id = self.case_of_payment(id)?;
        self.snapshot(&case_id)?
            .payment(id)
            .cloned()
            .ok_or_else(|| StoreError::PaymentNotFound(id.clone()))
    }

    pub fn payment_for_order(&self, order: &OrderRef) -> Option<PaymentId> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .payment_of_order
            .get(order)
            .cloned()
    }

    fn payments(&self, ids: Vec<PaymentId>) -> Vec<Payment> {
        ids.iter().filter_map(|id| self.find_payment(id).ok()).collect()
    }

    /// Every payment whose composed amount equals `amount`
    pub fn payments_with_amount(&self, amount: Amount) -> Vec<Payment> {
        let ids: Vec<PaymentId> = self
            .indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_amount
            .get(&amount)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        self.payments(ids)
    }

    /// Every payment created for base amount `base`
    pub fn payments_with_base(&self, base: Amount) -> Vec<Payment> {
        let ids: Vec<PaymentId> = self
            .indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_base
            .get(&base)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        self.payments(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casepay_core::{ActorId, CaseDetails, CaseKind, CaseStatus, UniqueCode};
    use chrono::Utc;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Store(StoreError),
        Refused,
    }

    impl From<StoreError> for TestError {
        fn from(err: StoreError) -> Self {
            TestError::Store(err)
        }
    }

    fn new_case(book: &CaseBook) -> CaseId {
        let case = Case::new(
            ActorId::new("alice"),
            CaseKind::SupportTicket,
            CaseDetails::titled("Locked out"),
            Utc::now(),
        );
        let id = case.id.clone();
        book.insert_case(case).unwrap();
        id
    }

    fn payment_for(case_id: &CaseId, base: u64, code: u16) -> Payment {
        Payment::new(
            case_id.clone(),
            "manual_transfer",
            Amount::new(base),
            UniqueCode::new(code).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let book = CaseBook::new();
        let id = new_case(&book);
        assert_eq!(book.get(&id).unwrap().status, CaseStatus::Draft);
        assert_eq!(book.len(), 1);

        let missing = CaseId::new("CASE-404");
        assert_eq!(book.get(&missing), Err(StoreError::CaseNotFound(missing)));
    }

    #[test]
    fn test_insert_with_failing_hook_stores_nothing() {
        let book = CaseBook::new();
        let case = Case::new(
            ActorId::new("alice"),
            CaseKind::SupportTicket,
            CaseDetails::titled("Locked out"),
            Utc::now(),
        );
        let id = case.id.clone();
        let result: Result<(), TestError> = book.insert_case_with(case, |_| Err(TestError::Refused));
        assert_eq!(result, Err(TestError::Refused));
        assert!(!book.contains(&id));
    }

    #[test]
    fn test_insert_hook_runs_without_holding_the_book() {
        let book = CaseBook::new();
        let existing = new_case(&book);
        let case = Case::new(
            ActorId::new("bob"),
            CaseKind::SupportTicket,
            CaseDetails::titled("Slow journal"),
            Utc::now(),
        );
        let id = case.id.clone();

        let seen: Result<(usize, bool), TestError> = book.insert_case_with(case, |_| {
            // both would block if the index were write-locked here
            let others = book.list().len();
            let touched = book
                .transact::<_, TestError, _>(&existing, |record| {
                    record.case.details.description = "touched".to_string();
                    Ok(())
                })
                .is_ok();
            Ok((others, touched))
        });
        assert_eq!(seen, Ok((1, true)));
        assert!(book.contains(&id));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_duplicate_insert_refused() {
        let book = CaseBook::new();
        let id = new_case(&book);
        let case = book.get(&id).unwrap();
        assert_eq!(book.insert_case(case), Err(StoreError::DuplicateCase(id)));
    }

    #[test]
    fn test_failed_transaction_leaves_record_unchanged() {
        let book = CaseBook::new();
        let id = new_case(&book);

        let result: Result<(), TestError> = book.transact(&id, |record| {
            record.case.status = CaseStatus::Rejected;
            record.payments.push(payment_for(&record.case.id, 1_000, 123));
            Err(TestError::Refused)
        });
        assert_eq!(result, Err(TestError::Refused));

        let record = book.snapshot(&id).unwrap();
        assert_eq!(record.case.status, CaseStatus::Draft);
        assert!(record.payments.is_empty());
        assert!(book.payments_with_amount(Amount::new(1_123)).is_empty());
    }

    #[test]
    fn test_committed_payment_is_indexed() {
        let book = CaseBook::new();
        let id = new_case(&book);

        let payment_id = book
            .transact::<_, TestError, _>(&id, |record| {
                let payment = payment_for(&record.case.id, 50_000, 187);
                let payment_id = payment.id().clone();
                record.payments.push(payment);
                Ok(payment_id)
            })
            .unwrap();

        assert_eq!(book.case_of_payment(&payment_id).unwrap(), id);
        let found = book.find_payment(&payment_id).unwrap();
        assert_eq!(found.amount(), Amount::new(50_187));
        assert_eq!(book.payment_for_order(found.order_ref()), Some(payment_id.clone()));
        assert_eq!(book.payments_with_amount(Amount::new(50_187)).len(), 1);
        assert_eq!(book.payments_with_base(Amount::new(50_000)).len(), 1);
    }

    #[test]
    fn test_unknown_case_in_transaction() {
        let book = CaseBook::new();
        let missing = CaseId::new("CASE-404");
        let result: Result<(), TestError> = book.transact(&missing, |_| Ok(()));
        assert_eq!(result, Err(TestError::Store(StoreError::CaseNotFound(missing))));
    }

    #[test]
    fn test_list_where() {
        let book = CaseBook::new();
        let first = new_case(&book);
        let second = new_case(&book);
        book.transact::<_, TestError, _>(&second, |record| {
            record.case.status = CaseStatus::Rejected;
            Ok(())
        })
        .unwrap();

        let drafts = book.list_where(|case| case.status == CaseStatus::Draft);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, first);
        assert_eq!(book.list().len(), 2);
    }

    #[test]
    fn test_transactions_on_one_case_serialize() {
        let book = CaseBook::new();
        let id = new_case(&book);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        book.transact::<_, TestError, _>(&id, |record| {
                            let next = record.case.details.description.len() + 1;
                            record.case.details.description = "x".repeat(next);
                            Ok(())
                        })
                        .unwrap();
                    }
                });
            }
        });

        assert_eq!(book.get(&id).unwrap().details.description.len(), 400);
    }
}
