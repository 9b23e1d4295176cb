//! Engine tuning knobs. Every field has a default so partial config files
//! deserialize.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FeePolicy, matching::MatchingConfig, touch::TouchConfig};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra attempts for a unit that failed with a transient error.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub write_timeout_ms: u64,
    /// Used when a transfer command does not pick a fee policy.
    pub fee_policy: FeePolicy,
    pub matching: MatchingConfig,
    pub touch: TouchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff_ms: 25,
            write_timeout_ms: 10_000,
            fee_policy: FeePolicy::SourcePays,
            matching: MatchingConfig::default(),
            touch: TouchConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Linear backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}
