//! Fixed-window limiter for magic link issuance, keyed by (email, survey).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{MagicLinkConfig, MAX_RATE_LIMIT_WINDOW_SECS};

#[derive(Debug)]
struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

pub struct IssuanceRateLimiter {
    enabled: bool,
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<(String, Uuid), Window>>,
}

impl IssuanceRateLimiter {
    pub fn new(config: &MagicLinkConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: config.enable_rate_limiting,
            max_requests: config.rate_limit_max_requests.max(1),
            window: Duration::seconds(config.rate_limit_window_secs.clamp(1, MAX_RATE_LIMIT_WINDOW_SECS) as i64),
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one attempt and say whether it may proceed
    pub async fn check(&self, email: &str, survey_id: Uuid) -> RateDecision {
        if !self.enabled {
            return RateDecision::Allowed;
        }

        let now = self.clock.now();
        let mut windows = self.windows.lock().await;

        // Drop stale windows so the map does not grow without bound
        if windows.len() > 10_000 {
            let window = self.window;
            windows.retain(|_, w| now - w.started_at < window);
        }

        let entry = windows
            .entry((email.to_ascii_lowercase(), survey_id))
            .or_insert(Window { started_at: now, count: 0 });

        if now - entry.started_at >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let remaining = (entry.started_at + self.window - now).num_seconds().max(1);
            return RateDecision::Limited {
                retry_after_secs: remaining as u64,
            };
        }

        entry.count += 1;
        RateDecision::Allowed
    }
}
