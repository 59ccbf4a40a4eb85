//! Condition trees — the uniform contract every gate in the scheduler speaks.
//!
//! A condition tree is built from three node kinds: time conditions (pure
//! functions of the clock), state conditions (queries against the world
//! oracle), and logical conditions composing other nodes with ALL/ANY
//! semantics. Task entries own exactly two trees: one gating start, one
//! gating stop.

pub mod logical;
pub mod state;
pub mod time;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use taskweave_core::StateOracle;

pub use logical::{Combinator, LockCondition, LogicalCondition};
pub use state::StateCondition;
pub use time::TimeCondition;

/// Everything a condition may consult during one evaluation. Built once per
/// polling tick; the oracle is the only clock source.
pub struct EvalContext<'a> {
    pub now: DateTime<Utc>,
    pub oracle: &'a dyn StateOracle,
}

impl<'a> EvalContext<'a> {
    pub fn new(oracle: &'a dyn StateOracle) -> Self {
        Self {
            now: oracle.now(),
            oracle,
        }
    }
}

/// The uniform condition contract.
///
/// `on_trigger_consumed` is the only mutating entry point: the driver calls it
/// once per firing to advance repeat counters and recompute the next trigger
/// (applying randomization through the supplied RNG). Conditions are never
/// evaluated concurrently by more than one caller.
pub trait Condition {
    fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool;

    /// The next instant this condition could trigger, if one is known.
    /// State conditions have no trigger instant.
    fn next_trigger(&self) -> Option<DateTime<Utc>>;

    fn on_trigger_consumed(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore);

    /// Re-arm the condition as if freshly configured.
    fn reset(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore);

    /// Rough progress toward satisfaction, for display. Defaults to a binary
    /// 0/100.
    fn progress_percent(&self, ctx: &EvalContext<'_>) -> f64 {
        if self.is_satisfied(ctx) {
            100.0
        } else {
            0.0
        }
    }

    fn describe(&self) -> String;
}

/// One node in a condition tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConditionNode {
    Time(TimeCondition),
    State(StateCondition),
    Logical(LogicalCondition),
}

impl ConditionNode {
    /// Collect every lock condition in this subtree.
    pub fn collect_locks(&self, out: &mut Vec<LockCondition>) {
        if let ConditionNode::Logical(logical) = self {
            logical.collect_locks(out);
        }
    }

    /// Pause every time condition in this subtree.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        match self {
            ConditionNode::Time(c) => c.pause(now),
            ConditionNode::Logical(l) => l.pause_all(now),
            ConditionNode::State(_) => {}
        }
    }

    /// Resume every time condition in this subtree, shifting pending
    /// triggers by the pause duration.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        match self {
            ConditionNode::Time(c) => c.resume(now),
            ConditionNode::Logical(l) => l.resume_all(now),
            ConditionNode::State(_) => {}
        }
    }
}

impl Condition for ConditionNode {
    fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            ConditionNode::Time(c) => c.is_satisfied(ctx),
            ConditionNode::State(c) => c.is_satisfied(ctx),
            ConditionNode::Logical(c) => c.is_satisfied(ctx),
        }
    }

    fn next_trigger(&self) -> Option<DateTime<Utc>> {
        match self {
            ConditionNode::Time(c) => c.next_trigger(),
            ConditionNode::State(c) => c.next_trigger(),
            ConditionNode::Logical(c) => c.next_trigger(),
        }
    }

    fn on_trigger_consumed(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        match self {
            ConditionNode::Time(c) => c.on_trigger_consumed(now, rng),
            ConditionNode::State(c) => c.on_trigger_consumed(now, rng),
            ConditionNode::Logical(c) => c.on_trigger_consumed(now, rng),
        }
    }

    fn reset(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        match self {
            ConditionNode::Time(c) => c.reset(now, rng),
            ConditionNode::State(c) => c.reset(now, rng),
            ConditionNode::Logical(c) => c.reset(now, rng),
        }
    }

    fn progress_percent(&self, ctx: &EvalContext<'_>) -> f64 {
        match self {
            ConditionNode::Time(c) => c.progress_percent(ctx),
            ConditionNode::State(c) => c.progress_percent(ctx),
            ConditionNode::Logical(c) => c.progress_percent(ctx),
        }
    }

    fn describe(&self) -> String {
        match self {
            ConditionNode::Time(c) => c.describe(),
            ConditionNode::State(c) => c.describe(),
            ConditionNode::Logical(c) => c.describe(),
        }
    }
}
