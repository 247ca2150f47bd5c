use std::time::Duration;

use logalike_message::Destination;

use crate::error::{
    BadDestinationPrefixSnafu, BadFlushIntervalSnafu, BadMaxActionsSnafu, BadMaxConcurrencySnafu,
    Error,
};

/// Bulk egress batcher configuration (§4.J, §6).
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub flush_interval: Duration,
    pub max_actions: usize,
    pub max_concurrency: usize,
    pub default_destination: Destination,
    pub doc_type: String,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(60),
            max_actions: 1000,
            max_concurrency: 4,
            default_destination: Destination::daily("logalike"),
            doc_type: "logalike".to_string(),
        }
    }
}

impl BatcherConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.flush_interval.is_zero() {
            return BadFlushIntervalSnafu.fail();
        }
        if self.max_actions == 0 {
            return BadMaxActionsSnafu.fail();
        }
        if self.max_concurrency == 0 {
            return BadMaxConcurrencySnafu.fail();
        }
        if self.default_destination.prefix.is_empty() {
            return BadDestinationPrefixSnafu.fail();
        }
        Ok(())
    }
}
