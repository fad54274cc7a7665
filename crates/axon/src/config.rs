//! Canonical configuration defaults.
//!
//! One explicit struct, threaded into construction sites. There is no
//! mutable global read at call time, so concurrent batches can never
//! observe a configuration change mid-flight.

use axon_batch::{ExecutionPolicy, DEFAULT_CONCURRENCY};
use axon_engine::TransductionOptions;
use std::time::Duration;

/// Engine-wide defaults, applied where the caller does not say otherwise.
#[derive(Debug, Clone)]
pub struct AxonConfig {
    /// Default concurrency bound for batch execution
    pub default_concurrency: usize,

    /// Default per-call backend deadline
    pub default_timeout: Duration,
}

impl Default for AxonConfig {
    fn default() -> Self {
        Self {
            default_concurrency: DEFAULT_CONCURRENCY,
            default_timeout: Duration::from_secs(60),
        }
    }
}

impl AxonConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.default_concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Execution policy derived from these defaults.
    pub fn policy(&self) -> ExecutionPolicy {
        ExecutionPolicy::new(self.default_concurrency)
    }

    /// Contract options derived from these defaults.
    pub fn options(&self) -> TransductionOptions {
        TransductionOptions::default().with_timeout(self.default_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_flow_into_policy_and_options() {
        let config = AxonConfig::default()
            .with_concurrency(3)
            .with_timeout(Duration::from_secs(10));

        assert_eq!(config.policy().concurrency, 3);
        assert_eq!(config.options().timeout, Duration::from_secs(10));
        // Strictness default is unchanged by config plumbing
        assert!(config.options().strict_output);
    }

    #[test]
    fn test_zero_concurrency_is_floored_by_policy() {
        let config = AxonConfig::default().with_concurrency(0);
        assert_eq!(config.policy().concurrency, 1);
    }
}
