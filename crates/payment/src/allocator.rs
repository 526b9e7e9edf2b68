//! Unique code allocation
//!
//! Codes are drawn uniformly from a fixed range with no shared state. Two
//! pending payments for the same base price may still end up with the same
//! code; the ledger narrows this by redrawing against codes it knows are
//! taken, and search surfaces every candidate when it happens anyway.

use casepay_core::{Amount, CoreError, UniqueCode};
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{PaymentError, PaymentResult};

/// Source of raw code draws
pub trait CodeSource: Send + Sync {
    /// A value in `min..=max`
    fn draw(&self, min: u16, max: u16) -> u16;
}

/// Uniform draws from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn draw(&self, min: u16, max: u16) -> u16 {
        rand::thread_rng().gen_range(min..=max)
    }
}

/// Replays a fixed sequence, repeating the last value once exhausted
#[derive(Debug)]
pub struct FixedCodes {
    queue: Mutex<VecDeque<u16>>,
    last: Mutex<Option<u16>>,
}

impl FixedCodes {
    pub fn new(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            queue: Mutex::new(codes.into_iter().collect()),
            last: Mutex::new(None),
        }
    }
}

impl CodeSource for FixedCodes {
    fn draw(&self, min: u16, max: u16) -> u16 {
        let next = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let value = next.or(*last).unwrap_or(min);
        *last = Some(value);
        value.clamp(min, max)
    }
}

#[derive(Clone)]
pub struct UniqueCodeAllocator {
    min: u16,
    max: u16,
    source: Arc<dyn CodeSource>,
}

impl std::fmt::Debug for UniqueCodeAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniqueCodeAllocator")
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

impl Default for UniqueCodeAllocator {
    fn default() -> Self {
        Self {
            min: UniqueCode::MIN,
            max: UniqueCode::MAX,
            source: Arc::new(RandomCodes),
        }
    }
}

impl UniqueCodeAllocator {
    /// Allocator over `min..=max`, which must lie within `100..=999`
    pub fn new(min: u16, max: u16, source: Arc<dyn CodeSource>) -> PaymentResult<Self> {
        if min > max || UniqueCode::new(min).is_err() || UniqueCode::new(max).is_err() {
            return Err(PaymentError::InvalidCodeRange { min, max });
        }
        Ok(Self { min, max, source })
    }

    pub fn random(min: u16, max: u16) -> PaymentResult<Self> {
        Self::new(min, max, Arc::new(RandomCodes))
    }

    /// One independent draw
    pub fn allocate(&self) -> UniqueCode {
        let value = self.source.draw(self.min, self.max);
        UniqueCode::clamped(value.clamp(self.min, self.max))
    }

    /// Draw up to `attempts` times until the code is not in `taken`. Returns
    /// the last draw if every attempt collides.
    pub fn allocate_avoiding(&self, taken: &HashSet<UniqueCode>, attempts: usize) -> UniqueCode {
        let mut code = self.allocate();
        for _ in 1..attempts.max(1) {
            if !taken.contains(&code) {
                break;
            }
            code = self.allocate();
        }
        code
    }
}

/// `base + code`
pub fn compose_amount(base: Amount, code: UniqueCode) -> Result<Amount, CoreError> {
    base.with_code(code)
}
