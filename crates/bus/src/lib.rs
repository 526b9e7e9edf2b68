//! CasePay Bus - Post-commit outbox
//!
//! Committed operations publish [`DeskEvent`]s to the [`Outbox`]. A
//! [`Dispatcher`] drains the channel and fans each event out to the
//! registered subscribers:
//! - `DocumentArchiver`: uploads staged attachments once a payment is confirmed
//! - `Notifier`: sends a case summary to the messaging collaborator
//! - `SheetMirrorSync`: pushes field deltas to the spreadsheet mirror
//!
//! A subscriber failure never touches committed state. It is logged and
//! recorded in the [`RetryStore`] for manual retry.

pub mod channel;
pub mod collaborator;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod retry;
pub mod subscriber;

pub use channel::{Outbox, OutboxReceiver};
pub use collaborator::{
    CaseSummary, Document, DocumentStorage, Messenger, RecordingMessenger, RecordingMirror,
    RecordingStorage, SheetMirror, StoredDocument,
};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{BusError, BusResult, CollaboratorError};
pub use event::DeskEvent;
pub use retry::{FailedDelivery, RetryStore};
pub use subscriber::{DocumentArchiver, EventSubscriber, Notifier, SheetMirrorSync};
