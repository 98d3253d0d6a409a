use std::sync::Mutex;

use time::OffsetDateTime;

/// Source of "now" for document timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to an instant until moved with `set` or `advance`.
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn new(instant: OffsetDateTime) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    pub fn set(&self, instant: OffsetDateTime) {
        *self.lock() = instant;
    }

    pub fn advance(&self, by: time::Duration) {
        let mut guard = self.lock();
        *guard += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OffsetDateTime> {
        // a poisoned guard still holds a valid instant
        self.instant.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn fixed_clock_moves_only_when_told() {
        let clock = FixedClock::new(datetime!(1992-05-28 23:12:11 +05:00));
        assert_eq!(clock.now(), datetime!(1992-05-28 23:12:11 +05:00));
        assert_eq!(clock.now(), clock.now());

        clock.advance(time::Duration::minutes(5));
        assert_eq!(clock.now(), datetime!(1992-05-28 23:17:11 +05:00));

        clock.set(datetime!(2001-01-01 0:00 UTC));
        assert_eq!(clock.now(), datetime!(2001-01-01 0:00 UTC));
    }

    #[test]
    fn system_clock_is_close_to_now() {
        let before = OffsetDateTime::now_utc();
        let now = SystemClock.now();
        assert!(now >= before);
        assert!(now - before < time::Duration::seconds(1));
    }
}
