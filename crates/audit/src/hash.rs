//! Per-subject hash chain

use sha2::{Digest, Sha256};

use crate::entry::AuditLogEntry;

/// `prev_hash` of the first entry of every subject
pub const GENESIS: &str = "GENESIS";

/// SHA-256 over every field except `hash`
pub fn calculate_entry_hash(entry: &AuditLogEntry) -> String {
    let mut hasher = Sha256::new();

    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.created_at.to_rfc3339().as_bytes());
    hasher.update(entry.id.as_bytes());

    // length-prefixed so adjacent fields cannot bleed into each other
    for field in [&entry.actor, &entry.subject, &entry.action] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }

    match &entry.before {
        Some(before) => hasher.update(before.to_string().as_bytes()),
        None => hasher.update(b"null-before"),
    }
    hasher.update(entry.after.to_string().as_bytes());

    hex::encode(hasher.finalize())
}

/// Verify one subject's chain, in insertion order
pub fn verify_chain(entries: &[AuditLogEntry]) -> Result<(), ChainError> {
    let mut prev_hash = GENESIS.to_string();
    let mut prev_created_at = None;

    for (i, entry) in entries.iter().enumerate() {
        let expected_sequence = i as u64 + 1;
        if entry.sequence != expected_sequence {
            return Err(ChainError::InvalidSequence {
                expected: expected_sequence,
                actual: entry.sequence,
            });
        }

        if entry.prev_hash != prev_hash {
            return Err(ChainError::BrokenLink {
                sequence: entry.sequence,
                expected: prev_hash,
                actual: entry.prev_hash.clone(),
            });
        }

        let calculated = calculate_entry_hash(entry);
        if entry.hash != calculated {
            return Err(ChainError::InvalidHash {
                sequence: entry.sequence,
                expected: calculated,
                actual: entry.hash.clone(),
            });
        }

        if prev_created_at.is_some_and(|prev| entry.created_at < prev) {
            return Err(ChainError::TimeReversal {
                sequence: entry.sequence,
            });
        }

        prev_hash = entry.hash.clone();
        prev_created_at = Some(entry.created_at);
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    BrokenLink {
        sequence: u64,
        expected: String,
        actual: String,
    },
    InvalidHash {
        sequence: u64,
        expected: String,
        actual: String,
    },
    InvalidSequence {
        expected: u64,
        actual: u64,
    },
    TimeReversal {
        sequence: u64,
    },
}

impl ChainError {
    pub fn sequence(&self) -> u64 {
        match self {
            ChainError::BrokenLink { sequence, .. }
            | ChainError::InvalidHash { sequence, .. }
            | ChainError::TimeReversal { sequence } => *sequence,
            ChainError::InvalidSequence { actual, .. } => *actual,
        }
    }
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::BrokenLink {
                sequence,
                expected,
                actual,
            } => write!(
                f,
                "broken link at seq {}: expected prev_hash '{}', got '{}'",
                sequence, expected, actual
            ),
            ChainError::InvalidHash { sequence, .. } => {
                write!(f, "content hash mismatch at seq {}", sequence)
            }
            ChainError::InvalidSequence { expected, actual } => {
                write!(f, "invalid sequence: expected {}, got {}", expected, actual)
            }
            ChainError::TimeReversal { sequence } => {
                write!(f, "timestamp goes backwards at seq {}", sequence)
            }
        }
    }
}

impl std::error::Error for ChainError {}
