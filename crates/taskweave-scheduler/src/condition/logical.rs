//! ALL/ANY composition over child conditions, plus exclusive lock semantics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{Condition, ConditionNode, EvalContext};

/// How a logical condition combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combinator {
    /// Every child must be satisfied. An empty child list is satisfied.
    All,
    /// At least one child must be satisfied. An empty child list is not.
    Any,
}

/// A veto held by an external collaborator.
///
/// While locked, the owning logical condition reports not-satisfied no matter
/// what its children say. Clones share the underlying flag, so a break-policy
/// handler can keep a handle and arm it around critical sections. The lock
/// state is runtime-only and always starts unlocked after a reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockCondition {
    name: String,
    #[serde(skip, default = "unlocked")]
    locked: Arc<AtomicBool>,
}

fn unlocked() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

impl LockCondition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locked: unlocked(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Set the lock state, returning the previous state.
    pub fn set_locked(&self, locked: bool) -> bool {
        self.locked.swap(locked, Ordering::AcqRel)
    }
}

/// A tree node combining child conditions with ALL/ANY semantics and an
/// optional lock veto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalCondition {
    combinator: Combinator,
    children: Vec<ConditionNode>,
    lock: Option<LockCondition>,
}

impl LogicalCondition {
    pub fn all() -> Self {
        Self::new(Combinator::All)
    }

    pub fn any() -> Self {
        Self::new(Combinator::Any)
    }

    pub fn new(combinator: Combinator) -> Self {
        Self {
            combinator,
            children: Vec::new(),
            lock: None,
        }
    }

    pub fn with_child(mut self, child: ConditionNode) -> Self {
        self.children.push(child);
        self
    }

    /// Attach a lock. The returned condition shares the lock flag with every
    /// clone of `lock` the caller keeps.
    pub fn with_lock(mut self, lock: LockCondition) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn children(&self) -> &[ConditionNode] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn lock(&self) -> Option<&LockCondition> {
        self.lock.as_ref()
    }

    /// Collect every lock in this subtree, own lock first.
    pub fn collect_locks(&self, out: &mut Vec<LockCondition>) {
        if let Some(lock) = &self.lock {
            out.push(lock.clone());
        }
        for child in &self.children {
            child.collect_locks(out);
        }
    }

    /// All locks in the subtree rooted here.
    pub fn find_all_lock_conditions(&self) -> Vec<LockCondition> {
        let mut out = Vec::new();
        self.collect_locks(&mut out);
        out
    }

    /// Pause every time condition in the subtree.
    pub fn pause_all(&mut self, now: DateTime<Utc>) {
        for child in &mut self.children {
            child.pause(now);
        }
    }

    /// Resume every time condition in the subtree.
    pub fn resume_all(&mut self, now: DateTime<Utc>) {
        for child in &mut self.children {
            child.resume(now);
        }
    }
}

impl Condition for LogicalCondition {
    fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        if self.lock.as_ref().is_some_and(LockCondition::is_locked) {
            return false;
        }
        match self.combinator {
            Combinator::All => self.children.iter().all(|c| c.is_satisfied(ctx)),
            Combinator::Any => self.children.iter().any(|c| c.is_satisfied(ctx)),
        }
    }

    /// The earliest trigger among children that report one.
    fn next_trigger(&self) -> Option<DateTime<Utc>> {
        self.children.iter().filter_map(|c| c.next_trigger()).min()
    }

    fn on_trigger_consumed(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        for child in &mut self.children {
            child.on_trigger_consumed(now, rng);
        }
    }

    fn reset(&mut self, now: DateTime<Utc>, rng: &mut dyn RngCore) {
        for child in &mut self.children {
            child.reset(now, rng);
        }
    }

    fn progress_percent(&self, ctx: &EvalContext<'_>) -> f64 {
        if self.children.is_empty() {
            return match self.combinator {
                Combinator::All => 100.0,
                Combinator::Any => 0.0,
            };
        }
        let progress = self.children.iter().map(|c| c.progress_percent(ctx));
        match self.combinator {
            // ALL advances with its laggard, ANY with its frontrunner.
            Combinator::All => progress.fold(100.0, f64::min),
            Combinator::Any => progress.fold(0.0, f64::max),
        }
    }

    fn describe(&self) -> String {
        let op = match self.combinator {
            Combinator::All => "ALL",
            Combinator::Any => "ANY",
        };
        let children: Vec<String> = self.children.iter().map(|c| c.describe()).collect();
        format!("{op}({})", children.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::state::tests::{FixedOracle, NullOracle};
    use crate::condition::state::StateCondition;
    use crate::condition::time::{IntervalCondition, SingleTriggerCondition, TimeCondition};
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use taskweave_core::{Skill, WorldPoint};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn skill_node(min: u32) -> ConditionNode {
        ConditionNode::State(StateCondition::SkillLevel {
            skill: Skill::Mining,
            min,
        })
    }

    fn mining_oracle(level: u32) -> FixedOracle {
        let mut oracle = FixedOracle::default();
        oracle.skills.insert(Skill::Mining, level);
        oracle
    }

    #[test]
    fn empty_all_is_satisfied_empty_any_is_not() {
        let oracle = NullOracle;
        let ctx = EvalContext { now: now(), oracle: &oracle };
        assert!(LogicalCondition::all().is_satisfied(&ctx));
        assert!(!LogicalCondition::any().is_satisfied(&ctx));
    }

    #[test]
    fn all_requires_every_child() {
        let oracle = mining_oracle(40);
        let ctx = EvalContext { now: now(), oracle: &oracle };

        let both_met = LogicalCondition::all()
            .with_child(skill_node(30))
            .with_child(skill_node(40));
        assert!(both_met.is_satisfied(&ctx));

        let one_unmet = LogicalCondition::all()
            .with_child(skill_node(30))
            .with_child(skill_node(50));
        assert!(!one_unmet.is_satisfied(&ctx));
    }

    #[test]
    fn any_requires_one_child() {
        let oracle = mining_oracle(40);
        let ctx = EvalContext { now: now(), oracle: &oracle };

        let one_met = LogicalCondition::any()
            .with_child(skill_node(99))
            .with_child(skill_node(40));
        assert!(one_met.is_satisfied(&ctx));

        let none_met = LogicalCondition::any()
            .with_child(skill_node(99))
            .with_child(skill_node(50));
        assert!(!none_met.is_satisfied(&ctx));
    }

    #[test]
    fn lock_vetoes_a_satisfied_tree() {
        let oracle = mining_oracle(40);
        let ctx = EvalContext { now: now(), oracle: &oracle };

        let handle = LockCondition::new("bank-run");
        let cond = LogicalCondition::all()
            .with_child(skill_node(30))
            .with_lock(handle.clone());
        assert!(cond.is_satisfied(&ctx));

        handle.lock();
        assert!(!cond.is_satisfied(&ctx));

        handle.unlock();
        assert!(cond.is_satisfied(&ctx));
    }

    #[test]
    fn collect_locks_finds_nested_locks() {
        let outer = LockCondition::new("outer");
        let inner = LockCondition::new("inner");
        let tree = LogicalCondition::all()
            .with_lock(outer)
            .with_child(ConditionNode::Logical(
                LogicalCondition::any()
                    .with_lock(inner)
                    .with_child(skill_node(1)),
            ));

        let locks = tree.find_all_lock_conditions();
        let names: Vec<&str> = locks.iter().map(LockCondition::name).collect();
        assert_eq!(names, vec!["outer", "inner"]);
    }

    #[test]
    fn clones_share_lock_state() {
        let a = LockCondition::new("shared");
        let b = a.clone();
        b.lock();
        assert!(a.is_locked());
        assert!(b.set_locked(false));
        assert!(!a.is_locked());
    }

    #[test]
    fn next_trigger_is_earliest_child_trigger() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut near = TimeCondition::SingleTrigger(SingleTriggerCondition::after(
            now(),
            Duration::minutes(5),
        ));
        near.reset(now(), &mut rng);
        let mut far = TimeCondition::Interval(IntervalCondition::new(Duration::hours(1)));
        far.reset(now(), &mut rng);

        let tree = LogicalCondition::any()
            .with_child(ConditionNode::Time(far))
            .with_child(ConditionNode::Time(near));
        assert_eq!(tree.next_trigger(), Some(now() + Duration::minutes(5)));
    }

    #[test]
    fn area_and_time_compose() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut oracle = mining_oracle(40);
        oracle.position = Some(WorldPoint::new(3200, 3200, 0));

        let mut gate = TimeCondition::Interval(IntervalCondition::new(Duration::minutes(10)));
        gate.reset(now(), &mut rng);
        let tree = LogicalCondition::all()
            .with_child(ConditionNode::Time(gate))
            .with_child(ConditionNode::State(StateCondition::PlayerInArea {
                center: WorldPoint::new(3200, 3200, 0),
                radius: 2,
            }));

        let early = EvalContext { now: now(), oracle: &oracle };
        assert!(!tree.is_satisfied(&early));
        let later = EvalContext {
            now: now() + Duration::minutes(10),
            oracle: &oracle,
        };
        assert!(tree.is_satisfied(&later));
    }
}
