//! Clock access, mockable for deterministic tests (cycle seeding, day-rollover, etc).
use chrono::{DateTime, Utc};

#[cfg(feature = "mock_time")]
use mock_instant::MockClock;

/// The current UTC instant. Tests compiled with `mock_time` can pin this via
/// [`set_current_time`]; the cycle driver and circuit breaker must go through this
/// function rather than `Utc::now()` directly so injected-clock scenarios (spec S4,
/// the daily breaker reset at UTC midnight) are reproducible.
#[cfg(not(feature = "mock_time"))]
pub fn now() -> DateTime<Utc> { Utc::now() }

#[cfg(feature = "mock_time")]
pub fn now() -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.timestamp_millis_opt(MockClock::time().as_millis() as i64).unwrap()
}

#[cfg(feature = "mock_time")]
pub fn set_current_time(t: DateTime<Utc>) {
    let d = std::time::Duration::from_millis(t.timestamp_millis().max(0) as u64);
    MockClock::set_time(d);
}

/// UTC midnight boundary for `t`'s calendar day.
pub fn day_start(t: DateTime<Utc>) -> DateTime<Utc> { t.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc() }
