//! World-state leaf conditions, evaluated against the oracle.
//!
//! A query the oracle cannot answer yet evaluates to not-satisfied. It never
//! errors and never panics; the condition simply stays unmet until the
//! session is ready.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use taskweave_core::{Skill, WorldPoint};

use super::{Condition, EvalContext};

/// A leaf condition over live world state. Unlike time conditions these carry
/// no trigger instant and no repeat bookkeeping; they are pure queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StateCondition {
    /// Item count within `[min, max]` (max unbounded when `None`).
    InventoryItemCount {
        item_id: u32,
        min: u32,
        max: Option<u32>,
    },
    /// Skill at or above a level.
    SkillLevel { skill: Skill, min: u32 },
    /// Player within `radius` tiles of `center`, same plane.
    PlayerInArea { center: WorldPoint, radius: i32 },
}

impl Condition for StateCondition {
    fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            StateCondition::InventoryItemCount { item_id, min, max } => {
                match ctx.oracle.item_count(*item_id) {
                    Some(count) => count >= *min && max.map_or(true, |hi| count <= hi),
                    None => false,
                }
            }
            StateCondition::SkillLevel { skill, min } => ctx
                .oracle
                .skill_level(*skill)
                .map_or(false, |level| level >= *min),
            StateCondition::PlayerInArea { center, radius } => ctx
                .oracle
                .position()
                .map_or(false, |pos| pos.is_within(center, *radius)),
        }
    }

    fn next_trigger(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn on_trigger_consumed(&mut self, _now: DateTime<Utc>, _rng: &mut dyn RngCore) {}

    fn reset(&mut self, _now: DateTime<Utc>, _rng: &mut dyn RngCore) {}

    fn progress_percent(&self, ctx: &EvalContext<'_>) -> f64 {
        match self {
            StateCondition::InventoryItemCount { item_id, min, .. } if *min > 0 => {
                match ctx.oracle.item_count(*item_id) {
                    Some(count) => ((count as f64 / *min as f64) * 100.0).clamp(0.0, 100.0),
                    None => 0.0,
                }
            }
            StateCondition::SkillLevel { skill, min } if *min > 0 => {
                match ctx.oracle.skill_level(*skill) {
                    Some(level) => ((level as f64 / *min as f64) * 100.0).clamp(0.0, 100.0),
                    None => 0.0,
                }
            }
            _ => {
                if self.is_satisfied(ctx) {
                    100.0
                } else {
                    0.0
                }
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            StateCondition::InventoryItemCount { item_id, min, max } => match max {
                Some(hi) => format!("item {item_id} x{min}-{hi}"),
                None => format!("item {item_id} x{min}+"),
            },
            StateCondition::SkillLevel { skill, min } => format!("{skill:?} >= {min}"),
            StateCondition::PlayerInArea { center, radius } => {
                format!("within {radius} of {center}")
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use taskweave_core::StateOracle;

    /// Oracle for a session that is not ready: every query returns `None`.
    pub(crate) struct NullOracle;

    impl StateOracle for NullOracle {
        fn position(&self) -> Option<WorldPoint> {
            None
        }
        fn session_ready(&self) -> bool {
            false
        }
        fn is_member(&self) -> Option<bool> {
            None
        }
        fn skill_level(&self, _skill: Skill) -> Option<u32> {
            None
        }
        fn quest_completed(&self, _quest_id: u32) -> Option<bool> {
            None
        }
        fn item_count(&self, _item_id: u32) -> Option<u32> {
            None
        }
        fn flag(&self, _flag_id: u32) -> Option<bool> {
            None
        }
    }

    /// Fixed-state oracle for condition tests.
    #[derive(Default)]
    pub(crate) struct FixedOracle {
        pub position: Option<WorldPoint>,
        pub member: Option<bool>,
        pub skills: HashMap<Skill, u32>,
        pub quests: HashMap<u32, bool>,
        pub items: HashMap<u32, u32>,
        pub flags: HashMap<u32, bool>,
    }

    impl StateOracle for FixedOracle {
        fn position(&self) -> Option<WorldPoint> {
            self.position
        }
        fn session_ready(&self) -> bool {
            true
        }
        fn is_member(&self) -> Option<bool> {
            self.member
        }
        fn skill_level(&self, skill: Skill) -> Option<u32> {
            self.skills.get(&skill).copied()
        }
        fn quest_completed(&self, quest_id: u32) -> Option<bool> {
            self.quests.get(&quest_id).copied()
        }
        fn item_count(&self, item_id: u32) -> Option<u32> {
            self.items.get(&item_id).copied()
        }
        fn flag(&self, flag_id: u32) -> Option<bool> {
            self.flags.get(&flag_id).copied()
        }
    }

    fn eval(cond: &StateCondition, oracle: &dyn StateOracle) -> bool {
        cond.is_satisfied(&EvalContext::new(oracle))
    }

    #[test]
    fn unknown_oracle_answers_are_unsatisfied() {
        let oracle = NullOracle;
        let conds = [
            StateCondition::InventoryItemCount {
                item_id: 995,
                min: 1,
                max: None,
            },
            StateCondition::SkillLevel {
                skill: Skill::Mining,
                min: 15,
            },
            StateCondition::PlayerInArea {
                center: WorldPoint::new(3200, 3200, 0),
                radius: 5,
            },
        ];
        for cond in &conds {
            assert!(!eval(cond, &oracle), "{} satisfied on null oracle", cond.describe());
        }
    }

    #[test]
    fn item_count_respects_bounds() {
        let mut oracle = FixedOracle::default();
        oracle.items.insert(995, 100);

        let at_least = StateCondition::InventoryItemCount {
            item_id: 995,
            min: 50,
            max: None,
        };
        assert!(eval(&at_least, &oracle));

        let banded = StateCondition::InventoryItemCount {
            item_id: 995,
            min: 10,
            max: Some(99),
        };
        assert!(!eval(&banded, &oracle));
    }

    #[test]
    fn skill_level_threshold() {
        let mut oracle = FixedOracle::default();
        oracle.skills.insert(Skill::Mining, 40);

        let cond = StateCondition::SkillLevel {
            skill: Skill::Mining,
            min: 40,
        };
        assert!(eval(&cond, &oracle));

        let higher = StateCondition::SkillLevel {
            skill: Skill::Mining,
            min: 41,
        };
        assert!(!eval(&higher, &oracle));
    }

    #[test]
    fn player_in_area_uses_chebyshev_distance() {
        let mut oracle = FixedOracle::default();
        oracle.position = Some(WorldPoint::new(3205, 3203, 0));

        let cond = StateCondition::PlayerInArea {
            center: WorldPoint::new(3200, 3200, 0),
            radius: 5,
        };
        assert!(eval(&cond, &oracle));

        oracle.position = Some(WorldPoint::new(3206, 3200, 0));
        assert!(!eval(&cond, &oracle));

        // Different plane never matches.
        oracle.position = Some(WorldPoint::new(3200, 3200, 1));
        assert!(!eval(&cond, &oracle));
    }

    #[test]
    fn partial_progress_toward_item_goal() {
        let mut oracle = FixedOracle::default();
        oracle.items.insert(554, 25);
        let cond = StateCondition::InventoryItemCount {
            item_id: 554,
            min: 100,
            max: None,
        };
        let pct = cond.progress_percent(&EvalContext::new(&oracle));
        assert!((pct - 25.0).abs() < f64::EPSILON);
    }
}
