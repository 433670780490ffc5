//! Clock source for lifecycle timestamps and the overdue predicate
//!
//! Instants are truncated to microseconds, the resolution of `TIMESTAMPTZ`,
//! so a timestamp handed back to a caller is the one a later read returns.

use chrono::{DateTime, Datelike, SubsecRound, Utc};

const STORED_SUBSEC_DIGITS: u16 = 6;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar year used for request numbering
    fn year(&self) -> i32 {
        self.now().year()
    }
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(STORED_SUBSEC_DIGITS)
    }
}

/// Clock pinned to a settable instant, for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::RwLock::new(now.trunc_subsecs(STORED_SUBSEC_DIGITS)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = now.trunc_subsecs(STORED_SUBSEC_DIGITS);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
