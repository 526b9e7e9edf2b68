//! Shared secret for inbound collaborator calls

use std::fmt;
use subtle::ConstantTimeEq;

use crate::error::{PolicyError, PolicyResult};

/// Opaque credential presented by the spreadsheet-mirror collaborator
///
/// Comparison is constant time in the length of the shorter input; the
/// value never appears in `Debug` output.
#[derive(Clone)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Returns `None` for an empty or whitespace-only secret
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value.trim().to_string()))
        }
    }

    pub fn matches(&self, provided: &str) -> bool {
        constant_time_eq(provided.trim(), &self.0)
    }

    pub fn verify(&self, provided: &str) -> PolicyResult<()> {
        if self.matches(provided) {
            Ok(())
        } else {
            tracing::warn!("inbound mirror secret rejected");
            Err(PolicyError::SecretMismatch)
        }
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
