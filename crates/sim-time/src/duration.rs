//! Exact integer-nanosecond duration arithmetic.
//!
//! All arithmetic happens on a signed nanosecond count; second, millisecond,
//! and microsecond views are derived. This keeps the simulated clock free of
//! floating-point drift no matter how many quanta a run accumulates.

use crate::error::{Result, TimeError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Rem, Sub, SubAssign};

const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A signed span of simulated time with nanosecond precision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Duration(i64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Duration(nanos)
    }

    pub const fn from_micros(micros: i64) -> Self {
        Duration(micros * NANOS_PER_MICRO)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Duration(millis * NANOS_PER_MILLI)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Duration(secs * NANOS_PER_SEC)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_micros(self) -> f64 {
        self.0 as f64 / NANOS_PER_MICRO as f64
    }

    pub fn as_millis(self) -> f64 {
        self.0 as f64 / NANOS_PER_MILLI as f64
    }

    pub fn as_secs(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Subtraction that floors at zero; used to drain overhead counters.
    pub fn saturating_sub(self, other: Duration) -> Duration {
        Duration((self.0 - other.0).max(0))
    }

    /// This duration as a fraction of `total`. Zero when `total` is zero.
    pub fn ratio_of(self, total: Duration) -> f64 {
        if total.is_zero() {
            return 0.0;
        }
        self.0 as f64 / total.0 as f64
    }

    /// Arithmetic mean of a collection of durations; zero for an empty one.
    pub fn avg<I>(values: I) -> Duration
    where
        I: IntoIterator<Item = Duration>,
    {
        let mut sum = 0i64;
        let mut count = 0i64;
        for value in values {
            sum += value.0;
            count += 1;
        }
        if count == 0 {
            Duration::ZERO
        } else {
            Duration(sum / count)
        }
    }

    /// A uniformly-distributed duration in the half-open interval
    /// `[start, end)`, drawn from the thread-local generator.
    pub fn rand_between(start: Duration, end: Duration) -> Result<Duration> {
        Self::rand_between_with(&mut rand::rng(), start, end)
    }

    /// [`Duration::rand_between`] with an explicit generator, for seeded and
    /// therefore reproducible draws.
    pub fn rand_between_with<R: Rng + ?Sized>(
        rng: &mut R,
        start: Duration,
        end: Duration,
    ) -> Result<Duration> {
        if start.is_negative() {
            return Err(TimeError::NegativeRangeStart { start });
        }
        if start >= end {
            return Err(TimeError::EmptyRange { start, end });
        }
        Ok(Duration(rng.random_range(start.0..end.0)))
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        self.0 -= rhs.0;
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration(-self.0)
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Duration {
        Duration(self.0 * rhs)
    }
}

impl Div<i64> for Duration {
    type Output = Duration;

    fn div(self, rhs: i64) -> Duration {
        Duration(self.0 / rhs)
    }
}

impl Rem for Duration {
    type Output = Duration;

    fn rem(self, rhs: Duration) -> Duration {
        Duration(self.0 % rhs.0)
    }
}

impl Sum for Duration {
    fn sum<I: Iterator<Item = Duration>>(iter: I) -> Duration {
        Duration(iter.map(|d| d.0).sum())
    }
}

impl<'a> Sum<&'a Duration> for Duration {
    fn sum<I: Iterator<Item = &'a Duration>>(iter: I) -> Duration {
        Duration(iter.map(|d| d.0).sum())
    }
}

impl fmt::Display for Duration {
    /// Renders the largest-unit breakdown, e.g. `2s150ms` or `-1ms200μs`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0ns");
        }
        if self.0 < 0 {
            write!(f, "-")?;
        }
        let nanos = self.0.unsigned_abs();
        let secs = nanos / NANOS_PER_SEC as u64;
        let millis = (nanos / NANOS_PER_MILLI as u64) % 1_000;
        let micros = (nanos / NANOS_PER_MICRO as u64) % 1_000;
        let rest = nanos % NANOS_PER_MICRO as u64;
        if secs != 0 {
            write!(f, "{secs}s")?;
        }
        if millis != 0 {
            write!(f, "{millis}ms")?;
        }
        if micros != 0 {
            write!(f, "{micros}μs")?;
        }
        if rest != 0 {
            write!(f, "{rest}ns")?;
        }
        Ok(())
    }
}
