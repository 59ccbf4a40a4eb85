//! Interval condition — met at (optionally randomized) regular intervals.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::randomization::{self, RandomUnit};
use super::TimeConditionState;
use crate::condition::{Condition, EvalContext};

/// Condition met once every interval. Supports a fixed base duration, a
/// [min, max] range drawn uniformly per firing, an initial delay applied only
/// before the first firing, and ± randomization in seconds.
///
/// Freshly constructed (and freshly deserialized) conditions are unarmed:
/// the owning entry arms them through [`Condition::reset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalCondition {
    interval_secs: i64,
    min_secs: Option<i64>,
    max_secs: Option<i64>,
    initial_delay_secs: Option<i64>,
    randomize: bool,
    /// Magnitude in seconds (the derived unit for interval-scale conditions).
    random_magnitude: i64,
    state: TimeConditionState,
}

impl IntervalCondition {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_secs: interval.num_seconds().max(1),
            min_secs: None,
            max_secs: None,
            initial_delay_secs: None,
            randomize: false,
            random_magnitude: 0,
            state: TimeConditionState::new(0),
        }
    }

    /// Range mode: each firing draws the interval uniformly from [min, max].
    /// A reversed range is normalized rather than rejected.
    pub fn between(min: Duration, max: Duration) -> Self {
        let (mut lo, mut hi) = (min.num_seconds().max(1), max.num_seconds().max(1));
        if hi < lo {
            tracing::warn!("interval range reversed ({lo}s..{hi}s), swapping");
            std::mem::swap(&mut lo, &mut hi);
        }
        let mut cond = Self::new(Duration::seconds((lo + hi) / 2));
        cond.min_secs = Some(lo);
        cond.max_secs = Some(hi);
        cond
    }

    pub fn with_max_repeats(mut self, max_repeats: u64) -> Self {
        self.state.max_repeats = max_repeats;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_secs = Some(delay.num_seconds().max(0));
        self
    }

    /// Enable ± randomization with the given magnitude in seconds. The
    /// magnitude is capped against the interval at draw time.
    pub fn with_randomization(mut self, magnitude_secs: i64) -> Self {
        self.randomize = magnitude_secs > 0;
        self.random_magnitude = magnitude_secs.max(0);
        self
    }

    pub(crate) fn state(&self) -> &TimeConditionState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut TimeConditionState {
        &mut self.state
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.interval_secs)
    }

    fn draw_interval_secs(&self, rng: &mut dyn RngCore) -> i64 {
        match (self.min_secs, self.max_secs) {
            (Some(lo), Some(hi)) if hi > lo => rng.gen_range(lo..=hi),
            (Some(lo), Some(_)) => lo,
            _ => self.interval_secs,
        }
    }

    /// Compute the next trigger from `now`. The initial delay is added only
    /// when arming for the first firing.
    fn compute_next(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore, first: bool) {
        let mut offset_secs = self.draw_interval_secs(rng);
        if first {
            offset_secs += self.initial_delay_secs.unwrap_or(0);
        }
        if self.randomize {
            offset_secs += randomization::random_offset_secs(
                self.random_magnitude,
                self.interval_secs,
                RandomUnit::Seconds,
                rng,
            );
        }
        // Randomization never schedules into the past.
        self.state.next_trigger = Some(now + Duration::seconds(offset_secs.max(0)));
    }
}

impl Condition for IntervalCondition {
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

    fn on_trigger_consumed(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        if !self.state.can_trigger_again() {
            return;
        }
        self.state.consume();
        self.compute_next(now, rng, false);
    }

    fn reset(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        self.state.rearm();
        self.compute_next(now, rng, true);
    }

    fn progress_percent(&self, ctx: &EvalContext<'_>) -> f64 {
        match self.state.next_trigger {
            Some(trigger) if trigger > ctx.now => {
                let remaining = (trigger - ctx.now).num_milliseconds() as f64;
                let total = (self.interval_secs * 1_000) as f64;
                ((1.0 - remaining / total) * 100.0).clamp(0.0, 100.0)
            }
            Some(_) => 100.0,
            None => 0.0,
        }
    }

    fn describe(&self) -> String {
        match (self.min_secs, self.max_secs) {
            (Some(lo), Some(hi)) => format!("every {lo}-{hi}s"),
            _ => format!("every {}s", self.interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::state::tests::NullOracle;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn ctx_at<'a>(at: DateTime<Utc>, oracle: &'a NullOracle) -> EvalContext<'a> {
        EvalContext { now: at, oracle }
    }

    #[test]
    fn fires_after_interval_elapses() {
        let oracle = NullOracle;
        let mut rng = StdRng::seed_from_u64(1);
        let mut cond = IntervalCondition::new(Duration::minutes(10));
        cond.reset(now(), &mut rng);

        assert!(!cond.is_satisfied(&ctx_at(now(), &oracle)));
        assert!(cond.is_satisfied(&ctx_at(now() + Duration::minutes(10), &oracle)));
    }

    #[test]
    fn initial_delay_applies_only_before_first_firing() {
        let oracle = NullOracle;
        let mut rng = StdRng::seed_from_u64(1);
        let mut cond =
            IntervalCondition::new(Duration::minutes(5)).with_initial_delay(Duration::minutes(30));
        cond.reset(now(), &mut rng);

        // First trigger is delayed by 30m + 5m.
        assert!(!cond.is_satisfied(&ctx_at(now() + Duration::minutes(34), &oracle)));
        assert!(cond.is_satisfied(&ctx_at(now() + Duration::minutes(35), &oracle)));

        let fired_at = now() + Duration::minutes(35);
        cond.on_trigger_consumed(fired_at, &mut rng);
        // Second trigger is just the plain interval.
        assert!(cond.is_satisfied(&ctx_at(fired_at + Duration::minutes(5), &oracle)));
    }

    #[test]
    fn randomized_next_trigger_stays_within_bounds() {
        // min=8m max=12m, magnitude 120s (under the 40% cap of 192s for the
        // 8m..12m midpoint); every draw must land in [min-m, max+m].
        let mut rng = StdRng::seed_from_u64(42);
        let lo = Duration::minutes(8).num_seconds() - 120;
        let hi = Duration::minutes(12).num_seconds() + 120;
        let mut cond = IntervalCondition::between(Duration::minutes(8), Duration::minutes(12))
            .with_randomization(120);

        for _ in 0..1_000 {
            cond.on_trigger_consumed(now(), &mut rng);
            let trigger = cond.next_trigger().unwrap();
            let secs = (trigger - now()).num_seconds();
            assert!(secs >= lo && secs <= hi, "drew {secs}s outside [{lo}, {hi}]");
            assert!(secs >= 0);
        }
    }

    #[test]
    fn repeat_ceiling_exhausts() {
        let oracle = NullOracle;
        let mut rng = StdRng::seed_from_u64(1);
        let mut cond = IntervalCondition::new(Duration::seconds(60)).with_max_repeats(2);
        cond.reset(now(), &mut rng);

        cond.on_trigger_consumed(now(), &mut rng);
        cond.on_trigger_consumed(now(), &mut rng);
        assert!(!cond.is_satisfied(&ctx_at(now() + Duration::hours(1), &oracle)));
        assert_eq!(cond.next_trigger(), None);
    }

    #[test]
    fn pause_shifts_trigger_on_resume() {
        let oracle = NullOracle;
        let mut rng = StdRng::seed_from_u64(1);
        let mut cond = IntervalCondition::new(Duration::minutes(10));
        cond.reset(now(), &mut rng);

        cond.state_mut().pause(now() + Duration::minutes(2));
        // Paused conditions are never due.
        assert!(!cond.is_satisfied(&ctx_at(now() + Duration::minutes(20), &oracle)));

        cond.state_mut().resume(now() + Duration::minutes(7));
        // 5 minutes of pause push the trigger from T+10 to T+15.
        assert!(!cond.is_satisfied(&ctx_at(now() + Duration::minutes(14), &oracle)));
        assert!(cond.is_satisfied(&ctx_at(now() + Duration::minutes(15), &oracle)));
    }
}
