//! Time-window condition — satisfied inside a daily window, gated by a
//! repeat cycle between firings.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::randomization::{self, unit_for_cycle};
use super::{RepeatCycle, TimeConditionState};
use crate::condition::{Condition, EvalContext};

/// Satisfied iff the current date lies inside the (optionally unbounded)
/// date range, the time-of-day lies inside the window — which may wrap past
/// midnight — and the repeat-cycle gate since the last firing has elapsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindowCondition {
    start_time: NaiveTime,
    end_time: NaiveTime,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    repeat_cycle: RepeatCycle,
    /// How many cycle units between firings.
    repeat_interval: u32,
    randomize: bool,
    /// Magnitude in the unit derived from the repeat cycle.
    random_magnitude: i64,
    /// `state.next_trigger` holds the repeat gate: the earliest instant the
    /// next firing is allowed. `None` means the gate is open.
    state: TimeConditionState,
}

impl TimeWindowCondition {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            start_time,
            end_time,
            start_date: None,
            end_date: None,
            repeat_cycle: RepeatCycle::Days,
            repeat_interval: 1,
            randomize: false,
            random_magnitude: 0,
            state: TimeConditionState::new(0),
        }
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_repeat(mut self, cycle: RepeatCycle, interval: u32) -> Self {
        self.repeat_cycle = cycle;
        self.repeat_interval = interval.max(1);
        self
    }

    pub fn with_max_repeats(mut self, max_repeats: u64) -> Self {
        self.state.max_repeats = max_repeats;
        self
    }

    pub fn with_randomization(mut self, magnitude: i64) -> Self {
        self.randomize = magnitude > 0;
        self.random_magnitude = magnitude.max(0);
        self
    }

    pub(crate) fn state(&self) -> &TimeConditionState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut TimeConditionState {
        &mut self.state
    }

    fn can_trigger(&self) -> bool {
        if self.repeat_cycle == RepeatCycle::OneTime && self.state.consumed >= 1 {
            return false;
        }
        self.state.can_trigger_again()
    }

    fn wraps_midnight(&self) -> bool {
        self.start_time > self.end_time
    }

    fn date_in_range(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.start_date {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if date > end {
                return false;
            }
        }
        true
    }

    fn time_in_window(&self, time: NaiveTime) -> bool {
        if self.wraps_midnight() {
            time >= self.start_time || time <= self.end_time
        } else {
            time >= self.start_time && time <= self.end_time
        }
    }

    /// Whether `now` falls inside both the date range and the daily window.
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.date_in_range(now.date_naive()) && self.time_in_window(now.time())
    }

    fn gate_open(&self, now: DateTime<Utc>) -> bool {
        match self.state.next_trigger {
            Some(gate) => now >= gate,
            None => true,
        }
    }

    /// Period of the repeat gate in seconds.
    fn cycle_secs(&self) -> i64 {
        self.repeat_cycle.unit_seconds() * i64::from(self.repeat_interval)
    }

    /// The next instant the daily window opens at or after `now`; `None` once
    /// the date range is exhausted.
    pub fn next_window_open(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.in_window(now) {
            return Some(now);
        }
        let mut date = now.date_naive();
        // A window that wrapped past midnight may still be open on date-1,
        // but we only look forward: scan up to the end date (or a year out
        // for unbounded ranges).
        for _ in 0..366 {
            if let Some(end) = self.end_date {
                if date > end {
                    return None;
                }
            }
            let candidate = Utc.from_utc_datetime(&date.and_time(self.start_time));
            if candidate >= now && self.date_in_range(date) {
                return Some(candidate);
            }
            date = date.succ_opt()?;
        }
        None
    }
}

impl Condition for TimeWindowCondition {
    fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        self.can_trigger()
            && !self.state.is_paused()
            && self.in_window(ctx.now)
            && self.gate_open(ctx.now)
    }

    fn next_trigger(&self) -> Option<DateTime<Utc>> {
        if !self.can_trigger() {
            return None;
        }
        // The gate alone when set; the window-open scan needs a reference
        // "now", which the gate provides. An open gate means "whenever the
        // window next opens", which callers resolve via ordering rules for
        // missing instants.
        self.state.next_trigger
    }

    fn on_trigger_consumed(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        if !self.can_trigger() {
            return;
        }
        self.state.consume();
        if self.repeat_cycle == RepeatCycle::OneTime {
            self.state.next_trigger = None;
            return;
        }
        let mut gate_secs = self.cycle_secs();
        if self.randomize {
            let unit = unit_for_cycle(self.repeat_cycle);
            gate_secs += randomization::random_offset_secs(
                self.random_magnitude,
                self.cycle_secs(),
                unit,
                rng,
            );
        }
        self.state.next_trigger = Some(now + Duration::seconds(gate_secs.max(0)));
    }

    fn reset(&mut self, _now: DateTime<Utc>, _rng: &mut dyn RngCore) {
        self.state.rearm();
    }

    fn describe(&self) -> String {
        format!(
            "window {}-{}{}",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M"),
            if self.wraps_midnight() {
                " (crosses midnight)"
            } else {
                ""
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::state::tests::NullOracle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn satisfied(cond: &TimeWindowCondition, now: DateTime<Utc>) -> bool {
        let oracle = NullOracle;
        cond.is_satisfied(&EvalContext { now, oracle: &oracle })
    }

    #[test]
    fn daytime_window() {
        let cond = TimeWindowCondition::new(t(9, 0), t(17, 0));
        assert!(satisfied(&cond, at(12, 0)));
        assert!(!satisfied(&cond, at(20, 0)));
        assert!(satisfied(&cond, at(9, 0)));
        assert!(satisfied(&cond, at(17, 0)));
    }

    #[test]
    fn midnight_crossing_window() {
        let cond = TimeWindowCondition::new(t(22, 0), t(6, 0));
        assert!(satisfied(&cond, at(23, 0)));
        assert!(satisfied(&cond, at(2, 0)));
        assert!(!satisfied(&cond, at(12, 0)));
    }

    #[test]
    fn date_range_bounds_the_window() {
        let cond = TimeWindowCondition::new(t(9, 0), t(17, 0)).with_dates(
            NaiveDate::from_ymd_opt(2026, 3, 15),
            NaiveDate::from_ymd_opt(2026, 3, 20),
        );
        // 2026-03-14 is before the start date.
        assert!(!satisfied(&cond, at(12, 0)));
        let inside = Utc.with_ymd_and_hms(2026, 3, 16, 12, 0, 0).unwrap();
        assert!(satisfied(&cond, inside));
        let after = Utc.with_ymd_and_hms(2026, 3, 21, 12, 0, 0).unwrap();
        assert!(!satisfied(&cond, after));
    }

    #[test]
    fn repeat_gate_blocks_until_cycle_elapses() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut cond =
            TimeWindowCondition::new(t(0, 0), t(23, 59)).with_repeat(RepeatCycle::Hours, 2);
        assert!(satisfied(&cond, at(10, 0)));

        cond.on_trigger_consumed(at(10, 0), &mut rng);
        assert!(!satisfied(&cond, at(11, 0)));
        assert!(satisfied(&cond, at(12, 0)));
    }

    #[test]
    fn one_time_cycle_fires_once() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut cond =
            TimeWindowCondition::new(t(9, 0), t(17, 0)).with_repeat(RepeatCycle::OneTime, 1);
        assert!(satisfied(&cond, at(12, 0)));
        cond.on_trigger_consumed(at(12, 0), &mut rng);
        assert!(!satisfied(&cond, at(13, 0)));
    }

    #[test]
    fn next_window_open_scans_forward() {
        let cond = TimeWindowCondition::new(t(9, 0), t(17, 0));
        let open = cond.next_window_open(at(20, 0)).unwrap();
        assert_eq!(
            open,
            Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap()
        );
        // Already inside the window.
        assert_eq!(cond.next_window_open(at(12, 0)), Some(at(12, 0)));
    }
}
