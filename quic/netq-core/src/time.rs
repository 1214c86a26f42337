// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! An opaque, monotonic clock abstraction so the protocol engine never reads
//! wall-clock time directly: callers supply timestamps, which keeps loss
//! detection and DPLPMTUD deterministic and testable without real sleeps.

use core::{fmt, num::NonZeroU64, time::Duration};

pub use core::time::Duration as StdDuration;

/// An absolute point in time from some unspecified, monotonic clock.
/// Only comparable against other `Timestamp`s from the same clock.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct Timestamp(NonZeroU64);

const ONE_MICROSECOND: NonZeroU64 = match NonZeroU64::new(1) {
    Some(v) => v,
    None => unreachable!(),
};

impl Timestamp {
    /// Constructs a `Timestamp` representing `duration` after the clock's
    /// epoch. Clock implementations are expected to use this as their
    /// translation point from `Instant`/similar into this opaque type.
    pub fn from_duration(duration: Duration) -> Self {
        let micros = duration.as_micros().min(u64::MAX as u128) as u64;
        Self(NonZeroU64::new(micros).unwrap_or(ONE_MICROSECOND))
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_micros(self.0.get())
    }

    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        self.as_duration().checked_add(duration).map(Self::from_duration)
    }

    pub fn checked_sub(self, duration: Duration) -> Option<Self> {
        self.as_duration().checked_sub(duration).map(Self::from_duration)
    }

    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        self.as_duration().saturating_sub(earlier.as_duration())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Timestamp({:?})", self.as_duration())
    }
}

/// Produces `Timestamp`s for the engine to stamp events with. Implementors
/// own the actual wall-clock or simulated-clock source; the engine only ever
/// asks "what time is it now".
pub trait Clock {
    fn get_time(&self) -> Timestamp;
}

/// A clock fed by monotonically nondecreasing values supplied by the
/// caller, for deterministic tests and simulations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Option<Timestamp>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: None }
    }

    pub fn set(&mut self, now: Timestamp) {
        debug_assert!(self.now.is_none_or_le(now), "clock must not move backward");
        self.now = Some(now);
    }
}

trait IsNoneOrLe {
    fn is_none_or_le(self, other: Timestamp) -> bool;
}

impl IsNoneOrLe for Option<Timestamp> {
    fn is_none_or_le(self, other: Timestamp) -> bool {
        match self {
            None => true,
            Some(existing) => existing <= other,
        }
    }
}

impl Clock for ManualClock {
    fn get_time(&self) -> Timestamp {
        self.now.expect("ManualClock::get_time called before set")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_round_trips_through_timestamp() {
        let d = Duration::from_millis(1500);
        let ts = Timestamp::from_duration(d);
        assert_eq!(ts.as_duration(), d);
    }

    #[test]
    fn saturating_duration_since_never_underflows() {
        let earlier = Timestamp::from_duration(Duration::from_secs(10));
        let later = Timestamp::from_duration(Duration::from_secs(5));
        assert_eq!(later.saturating_duration_since(earlier), Duration::ZERO);
    }

    #[test]
    fn manual_clock_reports_set_time() {
        let mut clock = ManualClock::new();
        let ts = Timestamp::from_duration(Duration::from_secs(1));
        clock.set(ts);
        assert_eq!(clock.get_time(), ts);
    }
}
