//! Window storage
//!
//! The store owns the mutable state: request timestamps per
//! `(identity, class)` and hard blocks per identity. Writes lock only the
//! windows they touch; the map lock is held just long enough to look up or
//! insert a window, never while a writer waits on a window lock.
//!
//! A sweep that drops a window retires it under the window lock. A writer
//! that finds its window retired looks it up again, so no admitted request
//! lands in a window that has left the map.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::config::LimitClass;

/// Key of one sliding window
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowKey {
    pub identity: String,
    pub class: LimitClass,
}

impl WindowKey {
    pub fn new(identity: impl Into<String>, class: LimitClass) -> Self {
        Self {
            identity: identity.into(),
            class,
        }
    }
}

/// One window taking part in an all-or-nothing admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    pub key: WindowKey,
    pub cutoff: DateTime<Utc>,
    pub max: usize,
}

/// Outcome of [`RateLimitStore::push_if_all_below`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Index of the first request whose window was full; `None` when every
    /// window took the timestamp
    pub denied: Option<usize>,
    /// Surviving timestamps per request after the operation, oldest first
    pub surviving: Vec<Vec<DateTime<Utc>>>,
}

impl Admission {
    pub fn admitted(&self) -> bool {
        self.denied.is_none()
    }
}

/// Outcome of a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub timestamps_purged: usize,
    pub windows_dropped: usize,
    pub blocks_expired: usize,
}

/// Backend for rate limit state
///
/// All `cutoff` arguments are exclusive: a timestamp survives only if it is
/// strictly newer than `cutoff`.
pub trait RateLimitStore: Send + Sync {
    /// Surviving timestamps for a window, oldest first. Must not mutate.
    fn surviving(&self, key: &WindowKey, cutoff: DateTime<Utc>) -> Vec<DateTime<Utc>>;

    /// Purge expired timestamps, then append `now`
    fn push(&self, key: &WindowKey, cutoff: DateTime<Utc>, now: DateTime<Utc>);

    /// Purge expired timestamps and append `now` only if fewer than `max`
    /// survive. Returns whether `now` was appended and the surviving
    /// timestamps after the operation, oldest first.
    fn push_if_below(
        &self,
        key: &WindowKey,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
        max: usize,
    ) -> (bool, Vec<DateTime<Utc>>) {
        let request = WindowRequest {
            key: key.clone(),
            cutoff,
            max,
        };
        let mut admission = self.push_if_all_below(std::slice::from_ref(&request), now);
        (admission.admitted(), admission.surviving.pop().unwrap_or_default())
    }

    /// Purge every requested window, then append `now` to all of them only
    /// if each has fewer than its `max` survivors. Nothing is appended when
    /// any window is full. `requests` must name distinct windows in
    /// ascending key order.
    fn push_if_all_below(&self, requests: &[WindowRequest], now: DateTime<Utc>) -> Admission;

    fn set_block(&self, identity: &str, until: DateTime<Utc>);

    /// Returns true if a block was present
    fn clear_block(&self, identity: &str) -> bool;

    fn blocked_until(&self, identity: &str) -> Option<DateTime<Utc>>;

    /// Purge every window using the per-class cutoff, drop empty windows and
    /// expired blocks
    fn sweep(
        &self,
        cutoff_for: &dyn Fn(LimitClass) -> DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SweepReport;

    /// Number of live windows
    fn window_count(&self) -> usize;
}

#[derive(Debug, Default)]
struct Slot {
    stamps: VecDeque<DateTime<Utc>>,
    /// Set by a sweep when the slot leaves the map
    retired: bool,
}

type Window = Arc<Mutex<Slot>>;

/// Per-process store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    windows: RwLock<HashMap<WindowKey, Window>>,
    blocks: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &WindowKey) -> Option<Window> {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn get_or_create(&self, key: &WindowKey) -> Window {
        if let Some(window) = self.get(key) {
            return window;
        }
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Lock the live windows for `keys`, in the given order, and run `f` on
    /// their timestamps
    fn with_live_windows<T>(
        &self,
        keys: &[&WindowKey],
        f: impl FnOnce(&mut [&mut VecDeque<DateTime<Utc>>]) -> T,
    ) -> T {
        loop {
            let windows: Vec<Window> = keys.iter().map(|key| self.get_or_create(key)).collect();
            let mut slots: Vec<MutexGuard<'_, Slot>> = windows
                .iter()
                .map(|window| window.lock().unwrap_or_else(PoisonError::into_inner))
                .collect();
            if slots.iter().any(|slot| slot.retired) {
                continue;
            }
            let mut stamps: Vec<&mut VecDeque<DateTime<Utc>>> =
                slots.iter_mut().map(|slot| &mut slot.stamps).collect();
            return f(&mut stamps);
        }
    }
}

fn purge(window: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) -> usize {
    let before = window.len();
    window.retain(|t| *t > cutoff);
    before - window.len()
}

fn sorted(window: &VecDeque<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
    let mut out: Vec<_> = window.iter().copied().collect();
    out.sort();
    out
}

impl RateLimitStore for InMemoryStore {
    fn surviving(&self, key: &WindowKey, cutoff: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let Some(window) = self.get(key) else {
            return Vec::new();
        };
        let slot = window.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = slot.stamps.iter().copied().filter(|t| *t > cutoff).collect();
        out.sort();
        out
    }

    fn push(&self, key: &WindowKey, cutoff: DateTime<Utc>, now: DateTime<Utc>) {
        self.with_live_windows(&[key], |windows| {
            for window in windows.iter_mut() {
                purge(window, cutoff);
                window.push_back(now);
            }
        });
    }

    fn push_if_all_below(&self, requests: &[WindowRequest], now: DateTime<Utc>) -> Admission {
        let keys: Vec<&WindowKey> = requests.iter().map(|request| &request.key).collect();
        self.with_live_windows(&keys, |windows| {
            for (window, request) in windows.iter_mut().zip(requests) {
                purge(window, request.cutoff);
            }
            let denied = windows
                .iter()
                .zip(requests)
                .position(|(window, request)| window.len() >= request.max);
            if denied.is_none() {
                for window in windows.iter_mut() {
                    window.push_back(now);
                }
            }
            Admission {
                denied,
                surviving: windows.iter().map(|window| sorted(window)).collect(),
            }
        })
    }

    fn set_block(&self, identity: &str, until: DateTime<Utc>) {
        self.blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.to_string(), until);
    }

    fn clear_block(&self, identity: &str) -> bool {
        self.blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
            .is_some()
    }

    fn blocked_until(&self, identity: &str) -> Option<DateTime<Utc>> {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .copied()
    }

    fn sweep(
        &self,
        cutoff_for: &dyn Fn(LimitClass) -> DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        {
            let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
            windows.retain(|key, window| {
                let mut slot = window.lock().unwrap_or_else(PoisonError::into_inner);
                report.timestamps_purged += purge(&mut slot.stamps, cutoff_for(key.class));
                let keep = !slot.stamps.is_empty();
                if !keep {
                    slot.retired = true;
                    report.windows_dropped += 1;
                }
                keep
            });
        }

        let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
        let before = blocks.len();
        blocks.retain(|_, until| *until > now);
        report.blocks_expired = before - blocks.len();

        report
    }

    fn window_count(&self) -> usize {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
