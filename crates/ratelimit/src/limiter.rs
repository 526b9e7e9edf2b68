//! Sliding-window rate limiter

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::{LimitClass, RateLimitConfig};
use crate::error::{RateLimitError, RateLimitResult};
use crate::store::{InMemoryStore, RateLimitStore, SweepReport, WindowKey, WindowRequest};

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Set when the identity is under a hard block
    pub blocked_until: Option<DateTime<Utc>>,
}

impl Decision {
    /// Whole seconds until the caller may retry, at least 1 when denied
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        if self.allowed {
            return 0;
        }
        let until = self.blocked_until.unwrap_or(self.reset_at);
        let millis = (until - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1_000).max(1)
    }
}

pub struct RateLimiter<S: RateLimitStore = InMemoryStore> {
    config: RateLimitConfig,
    store: S,
}

impl RateLimiter<InMemoryStore> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, InMemoryStore::new())
    }
}

impl Default for RateLimiter<InMemoryStore> {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn with_store(config: RateLimitConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn cutoff(&self, class: LimitClass, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.window(class).window()
    }

    fn decide(
        &self,
        class: LimitClass,
        surviving: &[DateTime<Utc>],
        now: DateTime<Utc>,
    ) -> Decision {
        let window = self.config.window(class);
        let count = surviving.len();
        let max = window.max_requests as usize;
        let reset_at = surviving
            .first()
            .map(|oldest| *oldest + window.window())
            .unwrap_or(now);

        Decision {
            allowed: count < max,
            remaining: max.saturating_sub(count) as u32,
            reset_at,
            blocked_until: None,
        }
    }

    fn active_block(&self, identity: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.store
            .blocked_until(identity)
            .filter(|until| *until > now)
    }

    fn blocked_decision(until: DateTime<Utc>) -> Decision {
        Decision {
            allowed: false,
            remaining: 0,
            reset_at: until,
            blocked_until: Some(until),
        }
    }

    /// Read-only admission check
    pub fn check(&self, identity: &str, class: LimitClass) -> Decision {
        self.check_at(identity, class, Utc::now())
    }

    pub fn check_at(&self, identity: &str, class: LimitClass, now: DateTime<Utc>) -> Decision {
        if let Some(until) = self.active_block(identity, now) {
            return Self::blocked_decision(until);
        }
        let key = WindowKey::new(identity, class);
        let surviving = self.store.surviving(&key, self.cutoff(class, now));
        self.decide(class, &surviving, now)
    }

    /// Count one admitted request. Call once per request, after `check`
    /// returned `allowed`.
    pub fn record(&self, identity: &str, class: LimitClass) {
        self.record_at(identity, class, Utc::now());
    }

    pub fn record_at(&self, identity: &str, class: LimitClass, now: DateTime<Utc>) {
        let key = WindowKey::new(identity, class);
        self.store.push(&key, self.cutoff(class, now), now);
    }

    /// Check and record in one step under the window lock
    pub fn try_acquire(&self, identity: &str, class: LimitClass) -> RateLimitResult<Decision> {
        self.try_acquire_at(identity, class, Utc::now())
    }

    pub fn try_acquire_at(
        &self,
        identity: &str,
        class: LimitClass,
        now: DateTime<Utc>,
    ) -> RateLimitResult<Decision> {
        self.try_acquire_all_at(identity, &[class], now)
    }

    /// Admit one request that counts against several classes at once
    ///
    /// Either every class records the request or none does. The returned
    /// decision is the one with the fewest remaining slots.
    pub fn try_acquire_all(&self, identity: &str, classes: &[LimitClass]) -> RateLimitResult<Decision> {
        self.try_acquire_all_at(identity, classes, Utc::now())
    }

    pub fn try_acquire_all_at(
        &self,
        identity: &str,
        classes: &[LimitClass],
        now: DateTime<Utc>,
    ) -> RateLimitResult<Decision> {
        if identity.trim().is_empty() {
            return Err(RateLimitError::EmptyIdentity);
        }

        if let Some(until) = self.active_block(identity, now) {
            let decision = Self::blocked_decision(until);
            tracing::warn!(
                identity = %identity,
                blocked_until = %until,
                "request from blocked identity"
            );
            return Err(RateLimitError::Blocked {
                until,
                retry_after_secs: decision.retry_after_secs(now),
            });
        }

        // Windows are locked in key order
        let mut classes = classes.to_vec();
        classes.sort();
        classes.dedup();

        let requests: Vec<WindowRequest> = classes
            .iter()
            .map(|&class| WindowRequest {
                key: WindowKey::new(identity, class),
                cutoff: self.cutoff(class, now),
                max: self.config.window(class).max_requests as usize,
            })
            .collect();
        let admission = self.store.push_if_all_below(&requests, now);

        if let Some(index) = admission.denied {
            let class = classes[index];
            let surviving = &admission.surviving[index];
            let decision = self.decide(class, surviving, now);
            let retry_after_secs = decision.retry_after_secs(now);
            tracing::warn!(
                identity = %identity,
                class = %class,
                requests = surviving.len(),
                max = requests[index].max,
                retry_after_secs,
                "rate limit exceeded"
            );
            return Err(RateLimitError::Exceeded {
                class,
                retry_after_secs,
                reset_at: decision.reset_at,
            });
        }

        let decision = classes
            .iter()
            .zip(&admission.surviving)
            .map(|(&class, surviving)| self.decide(class, surviving, now))
            .min_by_key(|decision| decision.remaining)
            .unwrap_or_else(|| self.decide(LimitClass::Api, &[], now));
        tracing::debug!(
            identity = %identity,
            classes = ?classes,
            remaining = decision.remaining,
            "request admitted"
        );
        Ok(decision)
    }

    /// Hard-block an identity for the configured block duration
    pub fn block(&self, identity: &str) -> DateTime<Utc> {
        self.block_at(identity, Utc::now(), self.config.block_duration())
    }

    pub fn block_at(&self, identity: &str, now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
        let until = now + duration;
        self.store.set_block(identity, until);
        tracing::warn!(identity = %identity, until = %until, "identity blocked");
        until
    }

    pub fn unblock(&self, identity: &str) -> bool {
        let removed = self.store.clear_block(identity);
        if removed {
            tracing::info!(identity = %identity, "identity unblocked");
        }
        removed
    }

    pub fn is_blocked_at(&self, identity: &str, now: DateTime<Utc>) -> bool {
        self.active_block(identity, now).is_some()
    }

    /// Purge expired state. Run periodically by the owner.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let report = self
            .store
            .sweep(&|class| self.cutoff(class, now), now);
        tracing::debug!(
            purged = report.timestamps_purged,
            windows_dropped = report.windows_dropped,
            blocks_expired = report.blocks_expired,
            "rate limiter sweep"
        );
        report
    }
}
