//! One-shot trigger at a fixed instant.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::TimeConditionState;
use crate::condition::{Condition, EvalContext};

/// Fires exactly once, at or after `target`. [`Condition::reset`] re-arms it
/// for another firing at the same instant; resetting after the instant has
/// passed makes it immediately due again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleTriggerCondition {
    target: DateTime<Utc>,
    state: TimeConditionState,
}

impl SingleTriggerCondition {
    pub fn at(target: DateTime<Utc>) -> Self {
        Self {
            target,
            state: TimeConditionState::new(1),
        }
    }

    /// Trigger once, `delay` from `now`.
    pub fn after(now: DateTime<Utc>, delay: Duration) -> Self {
        Self::at(now + delay)
    }

    pub fn target(&self) -> DateTime<Utc> {
        self.target
    }

    pub(crate) fn state(&self) -> &TimeConditionState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut TimeConditionState {
        &mut self.state
    }
}

impl Condition for SingleTriggerCondition {
    fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        self.state.can_trigger_again() && self.state.is_due(ctx.now)
    }

    fn next_trigger(&self) -> Option<DateTime<Utc>> {
        if self.state.can_trigger_again() {
            self.state.next_trigger
        } else {
            None
        }
    }

    fn on_trigger_consumed(&mut self, _now: DateTime<Utc>, _rng: &mut dyn RngCore) {
        if !self.state.can_trigger_again() {
            return;
        }
        self.state.consume();
        self.state.next_trigger = None;
    }

    fn reset(&mut self, _now: DateTime<Utc>, _rng: &mut dyn RngCore) {
        self.state.rearm();
        self.state.next_trigger = Some(self.target);
    }

    fn progress_percent(&self, ctx: &EvalContext<'_>) -> f64 {
        if self.state.can_trigger_again() && ctx.now >= self.target {
            100.0
        } else {
            0.0
        }
    }

    fn describe(&self) -> String {
        format!("once at {}", self.target.format("%Y-%m-%d %H:%M:%S"))
    }
}
