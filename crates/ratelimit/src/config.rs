//! Rate limit configuration
//!
//! Every limit class is independently configurable. Classes missing from a
//! config file fall back to their built-in defaults.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter, EnumString};

/// Named limit class
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString,
    Display, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LimitClass {
    /// Login attempts
    Login,
    /// Opening a case
    CaseCreate,
    /// Opening a payment attempt
    PaymentCreate,
    /// Operator confirm / reject / search calls
    PaymentConfirm,
    /// Attachment uploads
    Upload,
    /// Everything else
    Api,
}

/// Sliding window parameters for one class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl WindowConfig {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX / 1_000))
    }
}

impl LimitClass {
    /// Built-in window for this class
    pub fn default_window(&self) -> WindowConfig {
        match self {
            LimitClass::Login => WindowConfig::new(5, 15 * 60),
            LimitClass::CaseCreate => WindowConfig::new(10, 60 * 60),
            LimitClass::PaymentCreate => WindowConfig::new(10, 60 * 60),
            LimitClass::PaymentConfirm => WindowConfig::new(30, 60),
            LimitClass::Upload => WindowConfig::new(20, 60 * 60),
            LimitClass::Api => WindowConfig::new(120, 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Per-class overrides
    #[serde(default)]
    pub classes: BTreeMap<LimitClass, WindowConfig>,

    /// Duration of a hard block on a detected-abuse identity
    #[serde(default = "default_block_secs")]
    pub block_secs: u64,
}

fn default_block_secs() -> u64 {
    60 * 60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            classes: BTreeMap::new(),
            block_secs: default_block_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Override one class
    pub fn with_class(mut self, class: LimitClass, window: WindowConfig) -> Self {
        self.classes.insert(class, window);
        self
    }

    /// Effective window for a class
    pub fn window(&self, class: LimitClass) -> WindowConfig {
        self.classes
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_window())
    }

    pub fn block_duration(&self) -> Duration {
        Duration::seconds(i64::try_from(self.block_secs).unwrap_or(i64::MAX / 1_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.window(LimitClass::Login), WindowConfig::new(5, 900));
        assert_eq!(config.window(LimitClass::PaymentConfirm).max_requests, 30);
        assert_eq!(config.block_duration(), Duration::hours(1));
    }

    #[test]
    fn test_override_one_class() {
        let config =
            RateLimitConfig::default().with_class(LimitClass::Upload, WindowConfig::new(2, 10));
        assert_eq!(config.window(LimitClass::Upload), WindowConfig::new(2, 10));
        assert_eq!(config.window(LimitClass::Login), WindowConfig::new(5, 900));
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{ "classes": { "login": { "max_requests": 3, "window_secs": 60 } } }"#;
        let config: RateLimitConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.window(LimitClass::Login), WindowConfig::new(3, 60));
        assert_eq!(config.window(LimitClass::Api), LimitClass::Api.default_window());
        assert_eq!(config.block_secs, 3600);
    }

    #[test]
    fn test_class_names() {
        assert_eq!(LimitClass::PaymentConfirm.to_string(), "payment_confirm");
    }
}
