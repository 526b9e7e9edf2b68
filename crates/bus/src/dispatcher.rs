//! Outbox dispatcher
//!
//! ```text
//! Desk commit ──► Outbox ──► Dispatcher ──┬─► DocumentArchiver ──► DocumentStorage
//!                                         ├─► Notifier ─────────► Messenger
//!                                         └─► SheetMirrorSync ──► SheetMirror
//!                                                   │
//!                                              failure ──► RetryStore
//! ```

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::channel::OutboxReceiver;
use crate::error::BusResult;
use crate::event::DeskEvent;
use crate::retry::RetryStore;
use crate::subscriber::EventSubscriber;

/// Per-event (or per-retry-run) delivery outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Subscriber names (or retry ids) that succeeded
    pub delivered: Vec<String>,
    /// Subscriber names (or retry ids) that failed
    pub failed: Vec<String>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
pub struct Dispatcher {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
    retry: Option<Arc<RetryStore>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_store(mut self, retry: Arc<RetryStore>) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn subscribe(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn subscriber_names(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name()).collect()
    }

    pub fn retry_store(&self) -> Option<&Arc<RetryStore>> {
        self.retry.as_ref()
    }

    /// Deliver one event to every interested subscriber. Failures are
    /// logged and queued; they never propagate.
    pub async fn dispatch(&self, event: &DeskEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for subscriber in &self.subscribers {
            if !subscriber.interested(event) {
                continue;
            }

            match subscriber.handle(event).await {
                Ok(()) => report.delivered.push(subscriber.name().to_string()),
                Err(err) => {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        event = event.name(),
                        case_id = %event.case_id(),
                        tag = err.tag(),
                        error = %err,
                        "collaborator delivery failed"
                    );
                    self.queue_for_retry(subscriber.name(), event, &err.to_string());
                    report.failed.push(subscriber.name().to_string());
                }
            }
        }

        report
    }

    fn queue_for_retry(&self, subscriber: &str, event: &DeskEvent, error: &str) {
        let Some(retry) = &self.retry else {
            return;
        };
        if let Err(err) = retry.record(subscriber, event, error) {
            tracing::error!(
                subscriber,
                event = event.name(),
                case_id = %event.case_id(),
                error = %err,
                "failed delivery could not be queued"
            );
        }
    }

    /// Drain the outbox until every sender is dropped. Returns the number of
    /// events processed.
    pub async fn run(&self, mut receiver: OutboxReceiver) -> usize {
        let mut processed = 0;
        while let Some(event) = receiver.recv().await {
            self.dispatch(&event).await;
            processed += 1;
        }
        tracing::info!(processed, "outbox drained");
        processed
    }

    pub fn spawn(self: Arc<Self>, receiver: OutboxReceiver) -> JoinHandle<usize> {
        tokio::spawn(async move { self.run(receiver).await })
    }

    /// Replay every queued failure to the subscriber that failed it.
    /// Successes are marked resolved; failures bump the attempt count.
    pub async fn retry_pending(&self) -> BusResult<DispatchReport> {
        let mut report = DispatchReport::default();
        let Some(retry) = &self.retry else {
            return Ok(report);
        };

        for delivery in retry.pending()? {
            let Some(subscriber) = self
                .subscribers
                .iter()
                .find(|s| s.name() == delivery.subscriber)
            else {
                tracing::warn!(
                    id = %delivery.id,
                    subscriber = %delivery.subscriber,
                    "no subscriber registered for queued delivery"
                );
                report.failed.push(delivery.id);
                continue;
            };

            match subscriber.handle(&delivery.event).await {
                Ok(()) => {
                    retry.mark_resolved(&delivery.id)?;
                    tracing::info!(id = %delivery.id, subscriber = %delivery.subscriber, "queued delivery resolved");
                    report.delivered.push(delivery.id);
                }
                Err(err) => {
                    retry.record_attempt(&delivery.id, &err.to_string())?;
                    tracing::warn!(
                        id = %delivery.id,
                        subscriber = %delivery.subscriber,
                        attempts = delivery.attempts + 1,
                        error = %err,
                        "queued delivery failed again"
                    );
                    report.failed.push(delivery.id);
                }
            }
        }

        Ok(report)
    }
}
