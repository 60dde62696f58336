// Wall clock, injected so sampling cadence and report dates are testable.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
    /// Now, in the reporting time zone.
    fn now(&self) -> DateTime<Tz>;

    fn now_ts(&self) -> i64 {
        self.now().timestamp()
    }
}

pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}
