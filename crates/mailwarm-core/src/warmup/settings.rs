//! Runtime settings for the warm-up tick.

use serde::{Deserialize, Serialize};

/// Tunables of the warm-up pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupSettings {
    /// Probability of replying to a matched inbound message.
    pub reply_rate: f64,
    /// Probability of starring a matched inbound message.
    pub star_rate: f64,
    /// Inboxes processed at once within a tick.
    pub concurrency: usize,
    /// Maximum characters of error text kept in the send log.
    pub max_error_len: usize,
    /// Mixed into plan seeds so deployments do not share schedules.
    pub plan_salt: String,
}

impl Default for WarmupSettings {
    fn default() -> Self {
        Self {
            reply_rate: 0.4,
            star_rate: 0.2,
            concurrency: 4,
            max_error_len: 500,
            plan_salt: String::new(),
        }
    }
}

impl WarmupSettings {
    /// Clamps rates into `[0, 1]` and concurrency to at least one.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.reply_rate = clamp_rate(self.reply_rate);
        self.star_rate = clamp_rate(self.star_rate);
        self.concurrency = self.concurrency.max(1);
        self
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) }
}
