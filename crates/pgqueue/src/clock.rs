use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Source of "now" used by every operation that schedules or expires work.
///
/// Routed through explicitly rather than calling `Utc::now()` ad hoc so that
/// backoff and lease-expiry behavior can be driven deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Useful for asserting exact
/// `run_at`/backoff values without sleeping in tests.
#[derive(Clone)]
pub struct ManualClock {
    at: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at: Arc::new(Mutex::new(at)),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut at = self.at.lock().expect("clock mutex poisoned");
        *at += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock().expect("clock mutex poisoned")
    }
}
