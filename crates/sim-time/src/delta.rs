//! Tick grants handed down the scheduling tree.

use crate::duration::Duration;
use std::fmt;
use uuid::Uuid;

/// Opaque identity of a single tick grant.
///
/// A fresh token is minted per [`TimeDelta`] construction, never reused.
/// Tasks remember the last identity they consumed so a grant that reaches
/// them twice in one quantum (once through the owning executable, once
/// through the wait pass) is only applied once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeltaId(Uuid);

impl DeltaId {
    fn new() -> Self {
        DeltaId(Uuid::new_v4())
    }
}

impl fmt::Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One advance of the virtual clock: a duration plus a fresh identity.
///
/// Equality covers both fields, so two deltas of equal duration are never
/// equal to each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeDelta {
    pub duration: Duration,
    pub id: DeltaId,
}

impl TimeDelta {
    pub fn new(duration: Duration) -> Self {
        TimeDelta {
            duration,
            id: DeltaId::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_durations_are_not_equal_deltas() {
        let a = TimeDelta::new(Duration::from_micros(1));
        let b = TimeDelta::new(Duration::from_micros(1));
        assert_eq!(a.duration, b.duration);
        assert_ne!(a.id, b.id);
        assert_ne!(a, b);
    }

    #[test]
    fn a_delta_equals_its_copy() {
        let a = TimeDelta::new(Duration::from_micros(1));
        let b = a;
        assert_eq!(a, b);
    }
}
