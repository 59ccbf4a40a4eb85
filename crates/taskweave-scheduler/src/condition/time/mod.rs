//! Time-based conditions: four variants sharing one repeat/pause state block.

pub mod day_of_week;
pub mod interval;
pub mod randomization;
pub mod single;
pub mod window;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{Condition, EvalContext};

pub use day_of_week::DayOfWeekCondition;
pub use interval::IntervalCondition;
pub use randomization::RandomUnit;
pub use single::SingleTriggerCondition;
pub use window::TimeWindowCondition;

/// How often a time window re-opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatCycle {
    OneTime,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl RepeatCycle {
    /// Length of one cycle unit in seconds. `OneTime` has no period.
    pub fn unit_seconds(self) -> i64 {
        match self {
            RepeatCycle::OneTime => 0,
            RepeatCycle::Seconds => 1,
            RepeatCycle::Minutes => 60,
            RepeatCycle::Hours => 3_600,
            RepeatCycle::Days => 86_400,
            RepeatCycle::Weeks => 604_800,
        }
    }
}

/// Repeat-count, next-trigger, and pause bookkeeping shared by every time
/// condition variant.
///
/// `next_trigger` and pause state are transient: after a reload the owning
/// engine re-arms each tree via [`Condition::reset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConditionState {
    /// Maximum number of firings; 0 = unlimited.
    pub max_repeats: u64,
    #[serde(default)]
    pub consumed: u64,
    #[serde(skip)]
    pub next_trigger: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub paused_at: Option<DateTime<Utc>>,
}

impl TimeConditionState {
    pub fn new(max_repeats: u64) -> Self {
        Self {
            max_repeats,
            consumed: 0,
            next_trigger: None,
            paused_at: None,
        }
    }

    pub fn can_trigger_again(&self) -> bool {
        self.max_repeats == 0 || self.consumed < self.max_repeats
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// The next trigger shifted by any in-progress pause, so time spent
    /// paused does not count toward the trigger.
    pub fn effective_next_trigger(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let trigger = self.next_trigger?;
        match self.paused_at {
            Some(paused_at) => Some(trigger + (now - paused_at)),
            None => Some(trigger),
        }
    }

    /// Whether the trigger instant has been reached. Paused conditions are
    /// never due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.is_paused() {
            return false;
        }
        match self.next_trigger {
            Some(trigger) => now >= trigger,
            None => false,
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Resume, shifting the pending trigger by the pause duration.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            if let Some(trigger) = self.next_trigger {
                self.next_trigger = Some(trigger + (now - paused_at));
            }
        }
    }

    pub fn consume(&mut self) {
        self.consumed += 1;
    }

    pub fn rearm(&mut self) {
        self.consumed = 0;
        self.next_trigger = None;
        self.paused_at = None;
    }
}

/// A time-based condition, polymorphic over the four variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TimeCondition {
    Interval(IntervalCondition),
    Window(TimeWindowCondition),
    DayOfWeek(DayOfWeekCondition),
    SingleTrigger(SingleTriggerCondition),
}

impl TimeCondition {
    fn state(&self) -> &TimeConditionState {
        match self {
            TimeCondition::Interval(c) => c.state(),
            TimeCondition::Window(c) => c.state(),
            TimeCondition::DayOfWeek(c) => c.state(),
            TimeCondition::SingleTrigger(c) => c.state(),
        }
    }

    fn state_mut(&mut self) -> &mut TimeConditionState {
        match self {
            TimeCondition::Interval(c) => c.state_mut(),
            TimeCondition::Window(c) => c.state_mut(),
            TimeCondition::DayOfWeek(c) => c.state_mut(),
            TimeCondition::SingleTrigger(c) => c.state_mut(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.state_mut().pause(now);
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.state_mut().resume(now);
    }
}

impl Condition for TimeCondition {
    fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            TimeCondition::Interval(c) => c.is_satisfied(ctx),
            TimeCondition::Window(c) => c.is_satisfied(ctx),
            TimeCondition::DayOfWeek(c) => c.is_satisfied(ctx),
            TimeCondition::SingleTrigger(c) => c.is_satisfied(ctx),
        }
    }

    fn next_trigger(&self) -> Option<DateTime<Utc>> {
        match self {
            TimeCondition::Interval(c) => c.next_trigger(),
            TimeCondition::Window(c) => c.next_trigger(),
            TimeCondition::DayOfWeek(c) => c.next_trigger(),
            TimeCondition::SingleTrigger(c) => c.next_trigger(),
        }
    }

    fn on_trigger_consumed(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        match self {
            TimeCondition::Interval(c) => c.on_trigger_consumed(now, rng),
            TimeCondition::Window(c) => c.on_trigger_consumed(now, rng),
            TimeCondition::DayOfWeek(c) => c.on_trigger_consumed(now, rng),
            TimeCondition::SingleTrigger(c) => c.on_trigger_consumed(now, rng),
        }
    }

    fn reset(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        match self {
            TimeCondition::Interval(c) => c.reset(now, rng),
            TimeCondition::Window(c) => c.reset(now, rng),
            TimeCondition::DayOfWeek(c) => c.reset(now, rng),
            TimeCondition::SingleTrigger(c) => c.reset(now, rng),
        }
    }

    fn progress_percent(&self, ctx: &EvalContext<'_>) -> f64 {
        match self {
            TimeCondition::Interval(c) => c.progress_percent(ctx),
            TimeCondition::Window(c) => c.progress_percent(ctx),
            TimeCondition::DayOfWeek(c) => c.progress_percent(ctx),
            TimeCondition::SingleTrigger(c) => c.progress_percent(ctx),
        }
    }

    fn describe(&self) -> String {
        match self {
            TimeCondition::Interval(c) => c.describe(),
            TimeCondition::Window(c) => c.describe(),
            TimeCondition::DayOfWeek(c) => c.describe(),
            TimeCondition::SingleTrigger(c) => c.describe(),
        }
    }
}
