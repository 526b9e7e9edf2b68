//! Append-only JSONL journal
//!
//! One `AuditLogEntry` per line. The file is opened in append mode and is
//! never rewritten.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::entry::AuditLogEntry;
use crate::error::AuditResult;

pub struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    /// Open (or create) the journal at `path`
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self { path, file })
    }

    /// Write one entry and flush before returning
    pub fn append(&mut self, entry: &AuditLogEntry) -> AuditResult<()> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.file, "{}", json)?;
        self.file.flush()?;
        Ok(())
    }

    /// Every entry in file order
    pub fn read_all(&self) -> AuditResult<Vec<AuditLogEntry>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }

        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{calculate_entry_hash, GENESIS};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample(subject: &str) -> AuditLogEntry {
        let mut entry = AuditLogEntry {
            id: AuditLogEntry::generate_id(),
            sequence: 1,
            actor: "alice".into(),
            subject: subject.into(),
            action: "CASE_CREATED".into(),
            before: None,
            after: json!({ "status": "DRAFT" }),
            created_at: Utc::now(),
            prev_hash: GENESIS.into(),
            hash: String::new(),
        };
        entry.hash = calculate_entry_hash(&entry);
        entry
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit").join("trail.jsonl");

        let first = sample("CASE-1");
        let second = sample("CASE-2");
        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&first).unwrap();
            journal.append(&second).unwrap();
        }

        let journal = Journal::open(&path).unwrap();
        let entries = journal.read_all().unwrap();
        assert_eq!(entries, vec![first, second]);
        assert_eq!(journal.path(), path.as_path());
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trail.jsonl");

        Journal::open(&path).unwrap().append(&sample("CASE-1")).unwrap();
        Journal::open(&path).unwrap().append(&sample("CASE-1")).unwrap();

        assert_eq!(Journal::open(&path).unwrap().read_all().unwrap().len(), 2);
    }
}
