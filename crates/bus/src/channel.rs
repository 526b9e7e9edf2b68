//! Outbox channel
//!
//! Unbounded so publishing never blocks the synchronous commit path.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::event::DeskEvent;

/// Sending half, held by the desk
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: Option<UnboundedSender<DeskEvent>>,
}

/// Receiving half, drained by the dispatcher
pub type OutboxReceiver = UnboundedReceiver<DeskEvent>;

impl Outbox {
    pub fn channel() -> (Self, OutboxReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender: Some(sender) }, receiver)
    }

    /// Outbox that drops every event
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Publish a committed event. Returns false if the event was dropped.
    pub fn publish(&self, event: DeskEvent) -> bool {
        let Some(sender) = &self.sender else {
            tracing::debug!(event = event.name(), case_id = %event.case_id(), "outbox disabled, event dropped");
            return false;
        };

        let name = event.name();
        let case_id = event.case_id().clone();
        match sender.send(event) {
            Ok(()) => {
                tracing::debug!(event = name, case_id = %case_id, "event published");
                true
            }
            Err(_) => {
                tracing::warn!(event = name, case_id = %case_id, "outbox closed, event dropped");
                false
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.as_ref().is_some_and(|sender| !sender.is_closed())
    }
}
