//! External collaborators
//!
//! The desk only knows these interfaces. Delivery, storage layout and
//! spreadsheet schema belong to the implementations.

use async_trait::async_trait;
use casepay_core::{CaseId, CaseStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};

use crate::error::CollaboratorError;

/// File handed to document storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content_base64: String,
    pub filename: String,
    pub mime_type: String,
    /// Destination folder, one per case
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub file_id: String,
    pub url: String,
}

/// Message body for the messaging collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub case_id: CaseId,
    pub headline: String,
    pub status: Option<CaseStatus>,
}

/// Stores case documents
///
/// Storing the same (folder, filename) twice must not create a second file;
/// redelivered events may repeat an upload that already landed.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn store(&self, document: &Document) -> Result<StoredDocument, CollaboratorError>;
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, summary: &CaseSummary) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait SheetMirror: Send + Sync {
    async fn update_row(&self, row_ref: &str, delta: &Value) -> Result<(), CollaboratorError>;
}

/// In-process document storage that keeps what it receives
#[derive(Debug, Default)]
pub struct RecordingStorage {
    stored: Mutex<Vec<Document>>,
    fail_with: Option<String>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects every upload
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            stored: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn stored(&self) -> Vec<Document> {
        self.stored.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl DocumentStorage for RecordingStorage {
    async fn store(&self, document: &Document) -> Result<StoredDocument, CollaboratorError> {
        if let Some(message) = &self.fail_with {
            return Err(CollaboratorError::new("document_storage", message.clone()));
        }
        let mut stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        stored.push(document.clone());
        let file_id = format!("FILE-{}", stored.len());
        Ok(StoredDocument {
            url: format!("memory://{}/{}", document.folder, file_id),
            file_id,
        })
    }
}

/// In-process messenger that keeps what it receives
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<CaseSummary>>,
    fail_with: Option<String>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn sent(&self) -> Vec<CaseSummary> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, summary: &CaseSummary) -> Result<(), CollaboratorError> {
        if let Some(message) = &self.fail_with {
            return Err(CollaboratorError::new("messenger", message.clone()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary.clone());
        Ok(())
    }
}

/// In-process mirror that keeps `(row, delta)` pairs
#[derive(Debug, Default)]
pub struct RecordingMirror {
    rows: Mutex<Vec<(String, Value)>>,
    fail_with: Option<String>,
}

impl RecordingMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn rows(&self) -> Vec<(String, Value)> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl SheetMirror for RecordingMirror {
    async fn update_row(&self, row_ref: &str, delta: &Value) -> Result<(), CollaboratorError> {
        if let Some(message) = &self.fail_with {
            return Err(CollaboratorError::new("sheet_mirror", message.clone()));
        }
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((row_ref.to_string(), delta.clone()));
        Ok(())
    }
}
