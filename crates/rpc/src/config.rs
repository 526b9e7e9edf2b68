//! Desk configuration
//!
//! One JSON document; every section and field is optional and falls back to
//! its default.

use casepay_lifecycle::RetentionConfig;
use casepay_payment::PaymentConfig;
use casepay_policy::SharedSecret;
use casepay_ratelimit::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `outbox.mirror_secret`
pub const MIRROR_SECRET_ENV: &str = "CASEPAY_MIRROR_SECRET";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Append-only JSONL journal; in-memory trail when absent
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboxSettings {
    /// SQLite file for failed deliveries; in-memory queue when absent
    #[serde(default)]
    pub retry_db_path: Option<PathBuf>,

    /// Credential the spreadsheet mirror presents on inbound calls
    #[serde(default, skip_serializing)]
    pub mirror_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskConfig {
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub payments: PaymentConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub audit: AuditSettings,

    #[serde(default)]
    pub outbox: OutboxSettings,
}

impl DeskConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// File (or defaults) plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, std::io::Error> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_mirror_secret(std::env::var(MIRROR_SECRET_ENV).ok()))
    }

    /// Replace the mirror secret when an override is present
    pub fn with_mirror_secret(mut self, secret: Option<String>) -> Self {
        if let Some(secret) = secret {
            self.outbox.mirror_secret = Some(secret);
        }
        self
    }

    /// Blank secrets are treated as unset
    pub fn mirror_secret(&self) -> Option<SharedSecret> {
        self.outbox.mirror_secret.as_deref().and_then(SharedSecret::new)
    }
}
