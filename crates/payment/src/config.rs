//! Payment configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Provider tag stamped on every payment
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_code_min")]
    pub code_min: u16,

    #[serde(default = "default_code_max")]
    pub code_max: u16,

    /// Draws spent trying to avoid a code already pending for the same base
    #[serde(default = "default_unique_code_attempts")]
    pub unique_code_attempts: usize,
}

fn default_provider() -> String {
    "manual_transfer".to_string()
}

fn default_code_min() -> u16 {
    100
}

fn default_code_max() -> u16 {
    999
}

fn default_unique_code_attempts() -> usize {
    8
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            code_min: default_code_min(),
            code_max: default_code_max(),
            unique_code_attempts: default_unique_code_attempts(),
        }
    }
}
