//! CasePay Rate Limiter
//!
//! Sliding-window admission control keyed by `(identity, limit class)`.
//!
//! - Each limit class has its own `max_requests` / `window_secs`
//! - Each identity has its own window; throttling one never touches another
//! - A hard block overrides window state and is checked first
//! - A timestamp exactly `window` old is outside the window
//!
//! State lives behind the [`RateLimitStore`] trait. [`InMemoryStore`] is the
//! per-process implementation; a shared backend can replace it without
//! changing `check` / `record`.

pub mod config;
pub mod error;
pub mod limiter;
pub mod store;

pub use config::{LimitClass, RateLimitConfig, WindowConfig};
pub use error::{RateLimitError, RateLimitResult};
pub use limiter::{Decision, RateLimiter};
pub use store::{Admission, InMemoryStore, RateLimitStore, SweepReport, WindowKey, WindowRequest};
