//! Randomization arithmetic shared by the time condition variants.
//!
//! The randomization magnitude a user configures is expressed in a unit one
//! step finer than the condition's repeat cycle, and is capped at 40% of the
//! effective interval (converted into that unit) plus an absolute per-unit
//! ceiling. Both caps keep jitter from producing a negative or absurd
//! effective interval.

use rand::{Rng, RngCore};

use super::RepeatCycle;

/// Unit an offset is drawn in, derived from the repeat cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomUnit {
    Seconds,
    Minutes,
    Hours,
}

impl RandomUnit {
    pub fn unit_seconds(self) -> i64 {
        match self {
            RandomUnit::Seconds => 1,
            RandomUnit::Minutes => 60,
            RandomUnit::Hours => 3_600,
        }
    }

    /// Absolute ceiling on a randomization magnitude in this unit.
    pub fn absolute_cap(self) -> i64 {
        match self {
            RandomUnit::Seconds => 3_600,
            RandomUnit::Minutes => 720,
            RandomUnit::Hours => 48,
        }
    }
}

/// Derive the randomization unit for a repeat cycle: second- and
/// minute-scale cycles randomize in seconds, hour/day cycles in minutes,
/// week cycles in hours.
pub fn unit_for_cycle(cycle: RepeatCycle) -> RandomUnit {
    match cycle {
        RepeatCycle::OneTime | RepeatCycle::Seconds | RepeatCycle::Minutes => RandomUnit::Seconds,
        RepeatCycle::Hours | RepeatCycle::Days => RandomUnit::Minutes,
        RepeatCycle::Weeks => RandomUnit::Hours,
    }
}

/// Maximum allowed magnitude for an interval of `interval_secs`, in `unit`.
pub fn max_allowed_magnitude(interval_secs: i64, unit: RandomUnit) -> i64 {
    let interval_in_unit = interval_secs / unit.unit_seconds();
    let forty_percent = interval_in_unit * 2 / 5;
    forty_percent.min(unit.absolute_cap()).max(0)
}

/// Draw a uniform offset in `[-magnitude, +magnitude]` of `unit`, capped
/// against the interval, returned in seconds.
pub fn random_offset_secs(
    magnitude: i64,
    interval_secs: i64,
    unit: RandomUnit,
    rng: &mut dyn RngCore,
) -> i64 {
    let capped = magnitude.min(max_allowed_magnitude(interval_secs, unit));
    if capped <= 0 {
        return 0;
    }
    rng.gen_range(-capped..=capped) * unit.unit_seconds()
}
