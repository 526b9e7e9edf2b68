//! Event subscribers
//!
//! Each subscriber adapts desk events to one collaborator. Handlers must
//! tolerate redelivery: the retry path replays the same event.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::collaborator::{CaseSummary, Document, DocumentStorage, Messenger, SheetMirror};
use crate::error::{BusError, BusResult, CollaboratorError};
use crate::event::DeskEvent;

#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscriber name, used in logs and as the retry queue key
    fn name(&self) -> &str;

    /// Whether this subscriber wants the event at all
    fn interested(&self, _event: &DeskEvent) -> bool {
        true
    }

    async fn handle(&self, event: &DeskEvent) -> BusResult<()>;
}

fn failed(name: &str, source: CollaboratorError) -> BusError {
    BusError::SubscriberFailed {
        name: name.to_string(),
        source,
    }
}

/// Uploads a paid case's staged attachments into a per-case folder
///
/// Filenames already stored for a folder are skipped when the event is
/// replayed, so a retry after a partial failure only uploads the rest.
/// Progress lives in memory; across restarts storage is relied on to be
/// idempotent by (folder, filename).
pub struct DocumentArchiver {
    storage: Arc<dyn DocumentStorage>,
    archived: Mutex<HashMap<String, HashSet<String>>>,
}

impl DocumentArchiver {
    pub const NAME: &'static str = "document_archiver";

    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        Self {
            storage,
            archived: Mutex::new(HashMap::new()),
        }
    }

    fn already_archived(&self, folder: &str, filename: &str) -> bool {
        self.archived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(folder)
            .is_some_and(|names| names.contains(filename))
    }

    fn mark_archived(&self, folder: &str, filename: &str) {
        self.archived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(folder.to_string())
            .or_default()
            .insert(filename.to_string());
    }

    fn forget(&self, folder: &str) {
        self.archived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(folder);
    }
}

#[async_trait]
impl EventSubscriber for DocumentArchiver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interested(&self, event: &DeskEvent) -> bool {
        matches!(event, DeskEvent::PaymentConfirmed { attachments, .. } if !attachments.is_empty())
    }

    async fn handle(&self, event: &DeskEvent) -> BusResult<()> {
        let DeskEvent::PaymentConfirmed {
            case_id,
            attachments,
            ..
        } = event
        else {
            return Ok(());
        };

        let folder = case_id.to_string();
        for attachment in attachments {
            if self.already_archived(&folder, &attachment.filename) {
                tracing::debug!(
                    case_id = %case_id,
                    filename = %attachment.filename,
                    "attachment already archived"
                );
                continue;
            }
            let document = Document {
                content_base64: attachment.content_base64.clone(),
                filename: attachment.filename.clone(),
                mime_type: attachment.mime_type.clone(),
                folder: folder.clone(),
            };
            let stored = self
                .storage
                .store(&document)
                .await
                .map_err(|err| failed(Self::NAME, err))?;
            self.mark_archived(&folder, &document.filename);
            tracing::debug!(
                case_id = %case_id,
                filename = %document.filename,
                file_id = %stored.file_id,
                "attachment archived"
            );
        }
        self.forget(&folder);
        Ok(())
    }
}

/// Sends a one-line case summary for customer- and staff-visible changes
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
}

impl Notifier {
    pub const NAME: &'static str = "notifier";

    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    fn summarize(event: &DeskEvent) -> Option<CaseSummary> {
        let (headline, status) = match event {
            DeskEvent::CaseCreated { kind, title, .. } => {
                (format!("New {} case: {}", kind, title), None)
            }
            DeskEvent::PaymentConfirmed { title, amount, .. } => (
                format!("Payment of {} confirmed for {}", amount, title),
                Some(casepay_core::CaseStatus::Received),
            ),
            DeskEvent::PaymentRejected { order_ref, notes, .. } => (
                match notes {
                    Some(notes) => format!("Payment {} rejected: {}", order_ref, notes),
                    None => format!("Payment {} rejected", order_ref),
                },
                None,
            ),
            DeskEvent::StatusChanged { from, to, .. } => {
                (format!("Status changed from {} to {}", from, to), Some(*to))
            }
            DeskEvent::PaymentCreated { .. } | DeskEvent::OperatorAssigned { .. } => return None,
        };
        Some(CaseSummary {
            case_id: event.case_id().clone(),
            headline,
            status,
        })
    }
}

#[async_trait]
impl EventSubscriber for Notifier {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interested(&self, event: &DeskEvent) -> bool {
        Self::summarize(event).is_some()
    }

    async fn handle(&self, event: &DeskEvent) -> BusResult<()> {
        let Some(summary) = Self::summarize(event) else {
            return Ok(());
        };
        self.messenger
            .send(&summary)
            .await
            .map_err(|err| failed(Self::NAME, err))?;
        tracing::debug!(case_id = %summary.case_id, "notification sent");
        Ok(())
    }
}

/// Pushes per-case field deltas to the spreadsheet mirror, one row per case
pub struct SheetMirrorSync {
    mirror: Arc<dyn SheetMirror>,
}

impl SheetMirrorSync {
    pub const NAME: &'static str = "sheet_mirror";

    pub fn new(mirror: Arc<dyn SheetMirror>) -> Self {
        Self { mirror }
    }

    fn delta(event: &DeskEvent) -> serde_json::Value {
        match event {
            DeskEvent::CaseCreated {
                owner, kind, title, ..
            } => json!({ "owner": owner, "kind": kind, "title": title, "status": "DRAFT" }),
            DeskEvent::PaymentCreated {
                order_ref, amount, ..
            } => json!({ "order_ref": order_ref, "amount": amount, "payment_status": "PENDING" }),
            DeskEvent::PaymentConfirmed { .. } => {
                json!({ "status": "RECEIVED", "payment_status": "PAID" })
            }
            DeskEvent::PaymentRejected { .. } => json!({ "payment_status": "REJECTED" }),
            DeskEvent::StatusChanged { to, .. } => json!({ "status": to }),
            DeskEvent::OperatorAssigned { operator, .. } => json!({ "assigned_operator": operator }),
        }
    }
}

#[async_trait]
impl EventSubscriber for SheetMirrorSync {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, event: &DeskEvent) -> BusResult<()> {
        let delta = Self::delta(event);
        self.mirror
            .update_row(event.case_id().as_str(), &delta)
            .await
            .map_err(|err| failed(Self::NAME, err))?;
        tracing::debug!(case_id = %event.case_id(), event = event.name(), "mirror row updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{
        RecordingMessenger, RecordingMirror, RecordingStorage, StoredDocument,
    };
    use casepay_core::{
        Actor, ActorId, Amount, Attachment, Case, CaseDetails, CaseId, CaseKind, CaseStatus,
        Payment, UniqueCode,
    };
    use chrono::Utc;

    fn confirmed(with_attachment: bool) -> DeskEvent {
        let mut details = CaseDetails::titled("Account sale");
        if with_attachment {
            details = details.with_attachment(Attachment {
                filename: "proof.png".to_string(),
                mime_type: "image/png".to_string(),
                content_base64: "aGVsbG8=".to_string(),
            });
        }
        let case = Case::new(ActorId::new("alice"), CaseKind::SaleListing, details, Utc::now());
        let payment = Payment::new(
            case.id.clone(),
            "manual_transfer",
            Amount::new(50_000),
            UniqueCode::new(187).unwrap(),
            Utc::now(),
        )
        .unwrap();
        DeskEvent::payment_confirmed(&case, &payment, &Actor::operator("op-1").id)
    }

    #[tokio::test]
    async fn test_archiver_uploads_into_case_folder() {
        let storage = Arc::new(RecordingStorage::new());
        let archiver = DocumentArchiver::new(storage.clone());

        let event = confirmed(true);
        assert!(archiver.interested(&event));
        archiver.handle(&event).await.unwrap();

        let stored = storage.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].folder, event.case_id().as_str());
        assert_eq!(stored[0].filename, "proof.png");

        assert!(!archiver.interested(&confirmed(false)));
    }

    #[tokio::test]
    async fn test_failure_becomes_dependency_error() {
        let archiver = DocumentArchiver::new(Arc::new(RecordingStorage::failing("quota exceeded")));
        let err = archiver.handle(&confirmed(true)).await.unwrap_err();
        assert_eq!(err.kind(), casepay_core::ErrorKind::Dependency);
        assert!(matches!(err, BusError::SubscriberFailed { ref name, .. } if name == DocumentArchiver::NAME));
    }

    /// Storage whose second upload fails once
    struct FlakyStorage {
        inner: RecordingStorage,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl DocumentStorage for FlakyStorage {
        async fn store(&self, document: &Document) -> Result<StoredDocument, CollaboratorError> {
            let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if call == 1 {
                return Err(CollaboratorError::new("document_storage", "timeout"));
            }
            self.inner.store(document).await
        }
    }

    #[tokio::test]
    async fn test_replay_after_partial_failure_uploads_each_file_once() {
        let storage = Arc::new(FlakyStorage {
            inner: RecordingStorage::new(),
            calls: Default::default(),
        });
        let archiver = DocumentArchiver::new(storage.clone());

        let details = CaseDetails::titled("Account sale")
            .with_attachment(Attachment {
                filename: "a.png".to_string(),
                mime_type: "image/png".to_string(),
                content_base64: "YQ==".to_string(),
            })
            .with_attachment(Attachment {
                filename: "b.png".to_string(),
                mime_type: "image/png".to_string(),
                content_base64: "Yg==".to_string(),
            });
        let case = Case::new(ActorId::new("alice"), CaseKind::SaleListing, details, Utc::now());
        let payment = Payment::new(
            case.id.clone(),
            "manual_transfer",
            Amount::new(50_000),
            UniqueCode::new(187).unwrap(),
            Utc::now(),
        )
        .unwrap();
        let event = DeskEvent::payment_confirmed(&case, &payment, &Actor::operator("op-1").id);

        assert!(archiver.handle(&event).await.is_err());
        archiver.handle(&event).await.unwrap();

        let names: Vec<String> = storage.inner.stored().into_iter().map(|d| d.filename).collect();
        assert_eq!(names, vec!["a.png".to_string(), "b.png".to_string()]);
    }

    #[tokio::test]
    async fn test_notifier_skips_internal_events() {
        let messenger = Arc::new(RecordingMessenger::new());
        let notifier = Notifier::new(messenger.clone());

        let assigned = DeskEvent::operator_assigned(
            &CaseId::new("CASE-1"),
            None,
            &ActorId::new("op-1"),
            &ActorId::new("admin"),
        );
        assert!(!notifier.interested(&assigned));

        let changed = DeskEvent::status_changed(
            &CaseId::new("CASE-1"),
            CaseStatus::Received,
            CaseStatus::InReview,
            &ActorId::new("op-1"),
        );
        notifier.handle(&changed).await.unwrap();
        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status, Some(CaseStatus::InReview));
        assert_eq!(sent[0].headline, "Status changed from RECEIVED to IN_REVIEW");
    }

    #[tokio::test]
    async fn test_mirror_writes_one_row_per_case() {
        let mirror = Arc::new(RecordingMirror::new());
        let sync = SheetMirrorSync::new(mirror.clone());

        sync.handle(&confirmed(false)).await.unwrap();
        let rows = mirror.rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].0.starts_with("CASE-"));
        assert_eq!(rows[0].1["payment_status"], "PAID");
    }
}
