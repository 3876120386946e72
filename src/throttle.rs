use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{info, warn};

use crate::model::Ms;
use crate::observability;
use crate::timeline::{SECOND_MS, now_ms};

/// Attempt cap for one guarded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub max_attempts: u32,
    /// Length of the rolling window in which attempts accumulate.
    pub window_ms: Ms,
    /// How long the key stays blocked once the cap is hit. `None` rejects
    /// only while the window lasts.
    pub block_duration_ms: Option<Ms>,
}

// ── Presets ──────────────────────────────────────────────────────

pub const LOGIN_KEY: &str = "login";
pub const BOOKING_KEY: &str = "booking";
pub const SERVICE_CREATION_KEY: &str = "service_creation";

pub const LOGIN: ThrottleConfig = ThrottleConfig {
    max_attempts: 5,
    window_ms: 5 * 60 * SECOND_MS,
    block_duration_ms: Some(15 * 60 * SECOND_MS),
};

pub const BOOKING: ThrottleConfig = ThrottleConfig {
    max_attempts: 3,
    window_ms: 60 * SECOND_MS,
    block_duration_ms: Some(5 * 60 * SECOND_MS),
};

pub const SERVICE_CREATION: ThrottleConfig = ThrottleConfig {
    max_attempts: 10,
    window_ms: 60 * SECOND_MS,
    block_duration_ms: None,
};

/// Attempt bookkeeping for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRecord {
    pub count: u32,
    pub window_start: Ms,
    pub blocked_until: Option<Ms>,
}

impl ThrottleRecord {
    fn started(now: Ms) -> Self {
        Self {
            count: 1,
            window_start: now,
            blocked_until: None,
        }
    }

    fn is_blocked(&self, now: Ms) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// Keyed rolling-window attempt counter.
///
/// Client-side deterrent only: state lives in memory and is lost on restart,
/// so the authoritative backend must enforce an equal or stricter limit.
/// Stale windows and blocks are detected lazily on the next `check`; nothing
/// sweeps the map.
#[derive(Debug, Default)]
pub struct AttemptThrottle {
    records: DashMap<String, ThrottleRecord>,
}

static GLOBAL: LazyLock<Arc<AttemptThrottle>> = LazyLock::new(|| Arc::new(AttemptThrottle::new()));

/// The process-wide throttle.
pub fn global() -> Arc<AttemptThrottle> {
    GLOBAL.clone()
}

impl AttemptThrottle {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn check(&self, key: &str, config: &ThrottleConfig) -> bool {
        self.check_at(key, config, now_ms())
    }

    /// Record an attempt for `key` at `now`; `false` means reject.
    ///
    /// The read-modify-write runs under the key's map entry lock.
    pub fn check_at(&self, key: &str, config: &ThrottleConfig, now: Ms) -> bool {
        let allowed = match self.records.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(ThrottleRecord::started(now));
                true
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                if record.is_blocked(now) {
                    false
                } else if now - record.window_start > config.window_ms {
                    *record = ThrottleRecord::started(now);
                    true
                } else if record.count < config.max_attempts {
                    record.count += 1;
                    true
                } else {
                    if let Some(block) = config.block_duration_ms {
                        record.blocked_until = Some(now + block);
                        info!(key, block_ms = block, "throttle key blocked");
                        metrics::counter!(observability::THROTTLE_BLOCKS_TOTAL, "key" => key.to_owned())
                            .increment(1);
                    }
                    false
                }
            }
        };

        if !allowed {
            warn!(key, "attempt rejected by throttle");
            metrics::counter!(observability::THROTTLE_REJECTIONS_TOTAL, "key" => key.to_owned())
                .increment(1);
        }
        self.publish_len();
        allowed
    }

    fn publish_len(&self) {
        metrics::gauge!(observability::THROTTLE_KEYS).set(self.records.len() as f64);
    }

    pub fn blocked_remaining_seconds(&self, key: &str) -> u64 {
        self.blocked_remaining_seconds_at(key, now_ms())
    }

    /// Whole seconds (rounded up) until the block on `key` lifts; 0 when
    /// there is no active block.
    pub fn blocked_remaining_seconds_at(&self, key: &str, now: Ms) -> u64 {
        let Some(until) = self.records.get(key).and_then(|r| r.blocked_until) else {
            return 0;
        };
        ceil_seconds(until - now)
    }

    /// Whole seconds until a rejected `key` may try again: the active block
    /// if there is one, otherwise the rest of the current window. Never 0
    /// for a tracked key.
    pub fn retry_after_seconds_at(&self, key: &str, config: &ThrottleConfig, now: Ms) -> u64 {
        let Some(record) = self.record(key) else {
            return 0;
        };
        let until = match record.blocked_until {
            Some(until) if now < until => until,
            _ => record.window_start + config.window_ms,
        };
        ceil_seconds(until - now).max(1)
    }

    /// Forget `key`, e.g. after the guarded action succeeded.
    pub fn reset(&self, key: &str) {
        self.records.remove(key);
        self.publish_len();
    }

    pub fn clear_all(&self) {
        self.records.clear();
        self.publish_len();
    }

    pub fn record(&self, key: &str) -> Option<ThrottleRecord> {
        self.records.get(key).map(|r| *r.value())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn ceil_seconds(ms: Ms) -> u64 {
    (ms.max(0) + SECOND_MS - 1) as u64 / SECOND_MS as u64
}

/// Rejection returned by [`guard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttled {
    pub retry_after_secs: u64,
}

impl std::fmt::Display for Throttled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "too many attempts, retry in {} seconds", self.retry_after_secs)
    }
}

impl std::error::Error for Throttled {}

/// Run `action` behind the throttle.
///
/// A rejected attempt never runs the action. A successful action resets the
/// key; a failed one leaves its attempt counted.
pub async fn guard<T, E, F, Fut>(
    throttle: &AttemptThrottle,
    key: &str,
    config: &ThrottleConfig,
    now: Ms,
    action: F,
) -> Result<T, E>
where
    E: From<Throttled>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if !throttle.check_at(key, config, now) {
        let retry_after_secs = throttle.retry_after_seconds_at(key, config, now);
        return Err(Throttled { retry_after_secs }.into());
    }
    let result = action().await;
    if result.is_ok() {
        throttle.reset(key);
    }
    result
}
