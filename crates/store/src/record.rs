//! One case together with its payment attempts

use casepay_core::{Case, Payment, PaymentId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub case: Case,
    /// Attempts in creation order; at most one is pending
    pub payments: Vec<Payment>,
}

impl CaseRecord {
    pub fn new(case: Case) -> Self {
        Self {
            case,
            payments: Vec::new(),
        }
    }

    pub fn pending_payment(&self) -> Option<&Payment> {
        self.payments.iter().find(|p| p.is_pending())
    }

    pub fn pending_payment_mut(&mut self) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.is_pending())
    }

    pub fn payment(&self, id: &PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id() == id)
    }

    pub fn payment_mut(&mut self, id: &PaymentId) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.id() == id)
    }

    pub fn latest_payment(&self) -> Option<&Payment> {
        self.payments.last()
    }
}
