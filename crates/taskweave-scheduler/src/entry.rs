//! Task entries, the unit of scheduling.
//!
//! An entry owns two condition trees: one gating start, one gating stop. The
//! polling driver is the only mutator of run statistics; the ordering engine
//! reads entries as a snapshot and never writes.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::logical::{LockCondition, LogicalCondition};
use crate::condition::time::{IntervalCondition, TimeCondition};
use crate::condition::{Condition, ConditionNode, EvalContext};
use crate::goal::LocationRequirement;

/// Why an entry stopped running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The routine finished on its own.
    Finished,
    /// The stop condition tree became satisfied.
    StopConditionMet,
    /// The movement watchdog cancelled a stalled operation.
    WatchdogStall,
    /// A mandatory location requirement could not be fulfilled.
    MandatoryRequirementFailed,
    /// Stopped by the operator.
    Manual,
    /// The routine reported an error.
    Error(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Finished => write!(f, "finished"),
            StopReason::StopConditionMet => write!(f, "stop condition met"),
            StopReason::WatchdogStall => write!(f, "stalled"),
            StopReason::MandatoryRequirementFailed => write!(f, "requirement unmet"),
            StopReason::Manual => write!(f, "manual stop"),
            StopReason::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// One schedulable automation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    /// Default entries are the always-available fallback: lowest scheduling
    /// preference, typically with an empty (vacuously satisfied) start tree.
    pub is_default: bool,
    /// Higher is preferred.
    pub priority: i32,
    /// Whether this entry opts in to weighted random tie-breaking.
    pub allow_random_scheduling: bool,
    /// Opt-in for an empty stop tree. Without this flag an entry whose stop
    /// tree can never be satisfied is refused at start, because it would run
    /// forever.
    pub allow_unbounded_run: bool,
    pub start_condition: LogicalCondition,
    pub stop_condition: LogicalCondition,
    /// Location requirements resolved by the orchestrator before each run.
    #[serde(default)]
    pub requirements: Vec<LocationRequirement>,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_duration_ms: Option<i64>,
    #[serde(default)]
    pub last_stop_reason: Option<StopReason>,
    #[serde(skip)]
    pub is_running: bool,
    #[serde(skip)]
    started_at: Option<DateTime<Utc>>,
}

impl TaskEntry {
    pub fn new(
        name: impl Into<String>,
        start_condition: LogicalCondition,
        stop_condition: LogicalCondition,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            enabled: true,
            is_default: false,
            priority: 0,
            allow_random_scheduling: false,
            allow_unbounded_run: false,
            start_condition,
            stop_condition,
            requirements: Vec::new(),
            run_count: 0,
            last_run_at: None,
            last_run_duration_ms: None,
            last_stop_reason: None,
            is_running: false,
            started_at: None,
        }
    }

    /// Entry that starts on an interval and stops when the given tree is met.
    pub fn interval(
        name: impl Into<String>,
        every: Duration,
        stop_condition: LogicalCondition,
    ) -> Self {
        let start = LogicalCondition::all().with_child(ConditionNode::Time(
            TimeCondition::Interval(IntervalCondition::new(every)),
        ));
        Self::new(name, start, stop_condition)
    }

    /// Always-available fallback entry: empty start tree (vacuously
    /// satisfied), zero priority, marked default.
    pub fn fallback(name: impl Into<String>, stop_condition: LogicalCondition) -> Self {
        let mut entry = Self::new(name, LogicalCondition::all(), stop_condition);
        entry.is_default = true;
        entry
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_random_scheduling(mut self) -> Self {
        self.allow_random_scheduling = true;
        self
    }

    pub fn with_unbounded_run(mut self) -> Self {
        self.allow_unbounded_run = true;
        self
    }

    pub fn with_requirement(mut self, requirement: LocationRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the start condition tree is currently satisfied.
    pub fn is_due(&self, ctx: &EvalContext<'_>) -> bool {
        self.start_condition.is_satisfied(ctx)
    }

    /// Whether the running entry should be stopped.
    pub fn should_stop(&self, ctx: &EvalContext<'_>) -> bool {
        self.stop_condition.is_satisfied(ctx)
    }

    /// Whether this entry may be started at all: an empty ANY stop tree can
    /// never be satisfied, so starting it would run forever unless the entry
    /// opted in.
    pub fn has_bounded_stop(&self) -> bool {
        self.allow_unbounded_run || !self.stop_condition.is_empty()
    }

    /// Earliest known trigger instant from the start tree.
    pub fn next_trigger(&self) -> Option<DateTime<Utc>> {
        self.start_condition.next_trigger()
    }

    /// Every lock in both condition trees, for break-policy collaborators.
    pub fn find_all_lock_conditions(&self) -> Vec<LockCondition> {
        let mut locks = self.start_condition.find_all_lock_conditions();
        locks.extend(self.stop_condition.find_all_lock_conditions());
        locks
    }

    /// Whether any lock in either tree is currently armed.
    pub fn is_locked(&self) -> bool {
        self.find_all_lock_conditions()
            .iter()
            .any(LockCondition::is_locked)
    }

    /// Arm both trees. Called once after load and after each run completes.
    pub fn reset_conditions(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        self.start_condition.reset(now, rng);
        self.stop_condition.reset(now, rng);
    }

    /// Pause every time condition in both trees.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.start_condition.pause_all(now);
        self.stop_condition.pause_all(now);
    }

    /// Resume every time condition in both trees, shifting pending triggers.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.start_condition.resume_all(now);
        self.stop_condition.resume_all(now);
    }

    /// Driver bookkeeping when this entry is selected to run. Consumes the
    /// start trigger (advancing repeat counters, so an exhausted one-shot
    /// stays exhausted) and re-arms the stop tree so stop intervals measure
    /// from run start.
    pub fn record_start(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        self.is_running = true;
        self.run_count += 1;
        self.last_run_at = Some(now);
        self.started_at = Some(now);
        self.start_condition.on_trigger_consumed(now, rng);
        self.stop_condition.reset(now, rng);
    }

    /// Driver bookkeeping when this entry stops, for whatever reason.
    pub fn record_stop(&mut self, now: DateTime<Utc>, reason: StopReason) {
        self.is_running = false;
        self.last_stop_reason = Some(reason);
        if let Some(started_at) = self.started_at.take() {
            self.last_run_duration_ms = Some((now - started_at).num_milliseconds());
        }
    }
}
