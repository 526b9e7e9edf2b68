//! Audit trail
//!
//! Entries are grouped by subject. Appends to one subject serialize on that
//! subject's lock; appends to different subjects run independently, except
//! for the journal write, which is shared.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::entry::AuditLogEntry;
use crate::error::{AuditError, AuditResult};
use crate::hash::{calculate_entry_hash, verify_chain, GENESIS};
use crate::journal::Journal;

type Chain = Arc<Mutex<Vec<AuditLogEntry>>>;

pub struct AuditTrail {
    subjects: RwLock<HashMap<String, Chain>>,
    journal: Option<Mutex<Journal>>,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn require(field: &'static str, value: &str) -> AuditResult<()> {
    if value.trim().is_empty() {
        Err(AuditError::EmptyField(field))
    } else {
        Ok(())
    }
}

impl AuditTrail {
    /// Trail without persistence
    pub fn in_memory() -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
            journal: None,
        }
    }

    /// Open a journal-backed trail. Existing entries are replayed and every
    /// subject chain is verified before the trail accepts new appends.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let journal = Journal::open(path)?;

        let mut grouped: HashMap<String, Vec<AuditLogEntry>> = HashMap::new();
        for entry in journal.read_all()? {
            grouped.entry(entry.subject.clone()).or_default().push(entry);
        }

        for (subject, entries) in &grouped {
            verify_chain(entries).map_err(|source| AuditError::Chain {
                subject: subject.clone(),
                source,
            })?;
        }

        tracing::info!(
            path = %journal.path().display(),
            subjects = grouped.len(),
            entries = grouped.values().map(Vec::len).sum::<usize>(),
            "audit journal replayed"
        );

        let subjects = grouped
            .into_iter()
            .map(|(subject, entries)| (subject, Arc::new(Mutex::new(entries))))
            .collect();

        Ok(Self {
            subjects: RwLock::new(subjects),
            journal: Some(Mutex::new(journal)),
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.journal.is_some()
    }

    fn chain(&self, subject: &str) -> Option<Chain> {
        self.subjects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .cloned()
    }

    fn chain_or_create(&self, subject: &str) -> Chain {
        if let Some(chain) = self.chain(subject) {
            return chain;
        }
        self.subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(subject.to_string())
            .or_default()
            .clone()
    }

    /// Append one entry stamped with the current time
    pub fn append(
        &self,
        actor: &str,
        subject: &str,
        action: &str,
        before: Option<Value>,
        after: Option<Value>,
    ) -> AuditResult<AuditLogEntry> {
        self.append_at(actor, subject, action, before, after, Utc::now())
    }

    /// Append one entry. `after` is mandatory; `before` is null for
    /// creations. The stored timestamp never precedes the subject's previous
    /// entry.
    pub fn append_at(
        &self,
        actor: &str,
        subject: &str,
        action: &str,
        before: Option<Value>,
        after: Option<Value>,
        now: DateTime<Utc>,
    ) -> AuditResult<AuditLogEntry> {
        require("actor", actor)?;
        require("subject", subject)?;
        require("action", action)?;
        let after = match after {
            Some(Value::Null) | None => return Err(AuditError::MissingAfter),
            Some(after) => after,
        };

        let chain = self.chain_or_create(subject);
        let mut chain = chain.lock().unwrap_or_else(PoisonError::into_inner);

        let (sequence, prev_hash, created_at) = match chain.last() {
            Some(last) => (last.sequence + 1, last.hash.clone(), now.max(last.created_at)),
            None => (1, GENESIS.to_string(), now),
        };

        let mut entry = AuditLogEntry {
            id: AuditLogEntry::generate_id(),
            sequence,
            actor: actor.to_string(),
            subject: subject.to_string(),
            action: action.to_string(),
            before,
            after,
            created_at,
            prev_hash,
            hash: String::new(),
        };
        entry.hash = calculate_entry_hash(&entry);

        if let Some(journal) = &self.journal {
            journal
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .append(&entry)?;
        }

        chain.push(entry.clone());

        tracing::debug!(
            subject = %entry.subject,
            action = %entry.action,
            actor = %entry.actor,
            sequence = entry.sequence,
            "audit entry appended"
        );

        Ok(entry)
    }

    /// Entries for one subject, oldest first
    pub fn list_by_subject(&self, subject: &str) -> Vec<AuditLogEntry> {
        self.chain(subject)
            .map(|chain| chain.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Recompute one subject's chain. Returns the number of entries checked.
    pub fn verify_subject(&self, subject: &str) -> AuditResult<usize> {
        let entries = self.list_by_subject(subject);
        verify_chain(&entries).map_err(|source| AuditError::Chain {
            subject: subject.to_string(),
            source,
        })?;
        Ok(entries.len())
    }

    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<_> = self
            .subjects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        subjects.sort();
        subjects
    }

    /// Total number of entries across subjects
    pub fn len(&self) -> usize {
        let chains: Vec<Chain> = self
            .subjects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        chains
            .iter()
            .map(|chain| chain.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
