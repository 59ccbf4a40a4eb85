//! Day-of-week condition with per-day and per-week firing caps.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{IntervalCondition, TimeConditionState};
use crate::condition::{Condition, EvalContext};

/// ISO week key: (year, week number). Late-December days can belong to week 1
/// of the following year, which the iso_week accessor already handles.
type WeekKey = (i32, u32);

/// Satisfied when the current weekday is in the active set, neither the
/// per-day nor the per-week cap is exhausted, and the nested interval
/// condition (when present) is also satisfied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayOfWeekCondition {
    active_days: Vec<Weekday>,
    /// Firings allowed per calendar day; 0 = unlimited.
    max_per_day: u64,
    /// Firings allowed per ISO week; 0 = unlimited.
    max_per_week: u64,
    /// Optional cadence within an active day.
    interval: Option<Box<IntervalCondition>>,
    #[serde(skip)]
    day_counts: HashMap<NaiveDate, u64>,
    #[serde(skip)]
    week_counts: HashMap<WeekKey, u64>,
    state: TimeConditionState,
}

impl DayOfWeekCondition {
    pub fn new(active_days: impl Into<Vec<Weekday>>) -> Self {
        Self {
            active_days: active_days.into(),
            max_per_day: 0,
            max_per_week: 0,
            interval: None,
            day_counts: HashMap::new(),
            week_counts: HashMap::new(),
            state: TimeConditionState::new(0),
        }
    }

    pub fn weekdays() -> Self {
        Self::new(vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ])
    }

    pub fn with_daily_cap(mut self, max_per_day: u64) -> Self {
        self.max_per_day = max_per_day;
        self
    }

    pub fn with_weekly_cap(mut self, max_per_week: u64) -> Self {
        self.max_per_week = max_per_week;
        self
    }

    pub fn with_max_repeats(mut self, max_repeats: u64) -> Self {
        self.state.max_repeats = max_repeats;
        self
    }

    /// Nest an interval condition inside the active days. Both must be
    /// satisfied for this condition to be satisfied.
    pub fn with_interval(mut self, interval: IntervalCondition) -> Self {
        self.interval = Some(Box::new(interval));
        self
    }

    pub(crate) fn state(&self) -> &TimeConditionState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut TimeConditionState {
        &mut self.state
    }

    fn week_key(date: NaiveDate) -> WeekKey {
        let iso = date.iso_week();
        (iso.year(), iso.week())
    }

    fn is_active_day(&self, now: DateTime<Utc>) -> bool {
        self.active_days.contains(&now.weekday())
    }

    fn day_remaining(&self, now: DateTime<Utc>) -> bool {
        if self.max_per_day == 0 {
            return true;
        }
        let used = self
            .day_counts
            .get(&now.date_naive())
            .copied()
            .unwrap_or(0);
        used < self.max_per_day
    }

    fn week_remaining(&self, now: DateTime<Utc>) -> bool {
        if self.max_per_week == 0 {
            return true;
        }
        let used = self
            .week_counts
            .get(&Self::week_key(now.date_naive()))
            .copied()
            .unwrap_or(0);
        used < self.max_per_week
    }
}

impl Condition for DayOfWeekCondition {
    fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        if !self.state.can_trigger_again() || self.state.is_paused() {
            return false;
        }
        if !self.is_active_day(ctx.now)
            || !self.day_remaining(ctx.now)
            || !self.week_remaining(ctx.now)
        {
            return false;
        }
        match &self.interval {
            Some(interval) => interval.is_satisfied(ctx),
            None => true,
        }
    }

    fn next_trigger(&self) -> Option<DateTime<Utc>> {
        if !self.state.can_trigger_again() {
            return None;
        }
        self.interval.as_ref().and_then(|i| i.next_trigger())
    }

    fn on_trigger_consumed(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        if !self.state.can_trigger_again() {
            return;
        }
        self.state.consume();
        let date = now.date_naive();
        *self.day_counts.entry(date).or_insert(0) += 1;
        *self.week_counts.entry(Self::week_key(date)).or_insert(0) += 1;
        if let Some(interval) = &mut self.interval {
            interval.on_trigger_consumed(now, rng);
        }
    }

    fn reset(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        self.state.rearm();
        self.day_counts.clear();
        self.week_counts.clear();
        if let Some(interval) = &mut self.interval {
            interval.reset(now, rng);
        }
    }

    fn describe(&self) -> String {
        let days: Vec<String> = self.active_days.iter().map(|d| d.to_string()).collect();
        format!("on {}", days.join(","))
    }
}
