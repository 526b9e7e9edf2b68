//! Periodic maintenance owned by the process, not by the core

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::desk::Desk;

/// Rate limiter state is swept once a minute
pub const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Cancel stale drafts every `retention.sweep_interval_secs`
pub fn spawn_retention_sweep(desk: Arc<Desk>) -> JoinHandle<()> {
    let period = desk.config().retention.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let summary = desk.run_retention_sweep(Utc::now());
            if !summary.failed.is_empty() {
                tracing::warn!(failed = summary.failed.len(), "retention sweep left cases behind");
            }
        }
    })
}

pub fn spawn_limiter_sweep(desk: Arc<Desk>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            desk.sweep_limiter();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeskConfig;
    use casepay_bus::Outbox;
    use casepay_core::{Actor, ActorId, CaseDetails, CaseKind, CaseStatus};

    #[tokio::test]
    async fn test_retention_task_cancels_expired_drafts() {
        let mut config = DeskConfig::default();
        config.retention.max_draft_age_hours = 0;
        config.retention.sweep_interval_secs = 1;
        let desk = Arc::new(Desk::new(config, Outbox::disabled()).unwrap());

        let alice = Actor::customer("alice");
        let case = desk
            .create_case(&alice, ActorId::new("alice"), CaseKind::SupportTicket, CaseDetails::titled("Old"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // The first tick fires immediately.
        let handle = spawn_retention_sweep(Arc::clone(&desk));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let view = desk.get_case(&Actor::administrator("root"), &case.id).unwrap();
        assert_eq!(view.case.status, CaseStatus::Rejected);
    }
}
