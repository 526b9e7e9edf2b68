//! Amount and UniqueCode
//!
//! Amounts are integers in the minor currency unit. A payable amount is
//! always `base + unique_code`, where the code is a 3-digit suffix that lets
//! an operator tell apart pending payments for the same base price.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Non-negative amount in the minor currency unit
///
/// # Example
/// ```
/// use casepay_core::{Amount, UniqueCode};
///
/// let base = Amount::new(50_000);
/// let code = UniqueCode::new(187).unwrap();
/// assert_eq!(base.with_code(code).unwrap(), Amount::new(50_187));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn new(minor_units: u64) -> Self {
        Self(minor_units)
    }

    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Compose the payable amount `self + code`
    pub fn with_code(&self, code: UniqueCode) -> Result<Amount, CoreError> {
        self.0
            .checked_add(u64::from(code.value()))
            .map(Amount)
            .ok_or(CoreError::AmountOverflow {
                base: self.0,
                code: code.value(),
            })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// 3-digit payment disambiguation code in `100..=999`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct UniqueCode(u16);

impl UniqueCode {
    pub const MIN: u16 = 100;
    pub const MAX: u16 = 999;

    pub fn new(value: u16) -> Result<Self, CoreError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::UniqueCodeOutOfRange(u32::from(value)))
        }
    }

    /// Nearest valid code
    pub fn clamped(value: u16) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    #[inline]
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for UniqueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl TryFrom<u16> for UniqueCode {
    type Error = CoreError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UniqueCode> for u16 {
    fn from(code: UniqueCode) -> Self {
        code.0
    }
}

/// Parses the code as typed by an operator (`"187"`, `" 187 "`)
impl FromStr for UniqueCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::UniqueCodeNotNumeric(s.to_string()));
        }
        let value: u32 = trimmed
            .parse()
            .map_err(|_| CoreError::UniqueCodeNotNumeric(s.to_string()))?;
        match u16::try_from(value) {
            Ok(v) => Self::new(v),
            Err(_) => Err(CoreError::UniqueCodeOutOfRange(value)),
        }
    }
}
