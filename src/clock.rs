use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Source of wall-clock time and monotonic ticks. The ingestion pipeline takes
/// one of these so a fixed clock yields byte-identical plans.
pub(crate) trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time since an arbitrary origin, for stage timings.
    fn tick(&self) -> Duration;

    fn since(&self, start: Duration) -> Duration {
        self.tick().saturating_sub(start)
    }
}

pub(crate) struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn tick(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Always reports the same instant; every measured duration is zero.
#[cfg(test)]
pub(crate) struct FixedClock(pub(crate) DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    fn tick(&self) -> Duration {
        Duration::ZERO
    }
}

pub(crate) fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
