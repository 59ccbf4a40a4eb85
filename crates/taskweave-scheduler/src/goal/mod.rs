//! Goal fulfillment: location/resource prerequisites and the machinery that
//! satisfies them before a task runs.
//!
//! A requirement declares one or more acceptable targets, each annotated with
//! access prerequisites. "Fulfilled" means the current position is within
//! tolerance of at least one prerequisite-satisfying target. The orchestrator
//! drives travel and world relocation through the collaborator traits, with a
//! stall watchdog and bounded hop retries.

pub mod hop;
pub mod orchestrator;
pub mod watchdog;

use serde::{Deserialize, Serialize};
use taskweave_core::{Skill, StateOracle, WorldPoint};

pub use orchestrator::{FulfillmentOutcome, GoalOrchestrator};
pub use watchdog::CancelFlag;

/// How hard the orchestrator must try to fulfill a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementPriority {
    /// Failure aborts the dependent task.
    Mandatory,
    /// Failure degrades to skipped-success, logged at warn.
    Recommended,
    /// Failure degrades to skipped-success, logged at debug.
    Optional,
}

/// One acceptable destination with its access prerequisites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationTarget {
    pub name: String,
    pub point: WorldPoint,
    #[serde(default)]
    pub members_only: bool,
    #[serde(default)]
    pub required_quests: Vec<u32>,
    /// (skill, minimum level) pairs.
    #[serde(default)]
    pub required_skills: Vec<(Skill, u32)>,
    /// (item id, minimum count) pairs.
    #[serde(default)]
    pub required_items: Vec<(u32, u32)>,
    #[serde(default)]
    pub required_flags: Vec<u32>,
}

impl LocationTarget {
    pub fn new(name: impl Into<String>, point: WorldPoint) -> Self {
        Self {
            name: name.into(),
            point,
            members_only: false,
            required_quests: Vec::new(),
            required_skills: Vec::new(),
            required_items: Vec::new(),
            required_flags: Vec::new(),
        }
    }

    pub fn members_only(mut self) -> Self {
        self.members_only = true;
        self
    }

    pub fn require_quest(mut self, quest_id: u32) -> Self {
        self.required_quests.push(quest_id);
        self
    }

    pub fn require_skill(mut self, skill: Skill, level: u32) -> Self {
        self.required_skills.push((skill, level));
        self
    }

    pub fn require_item(mut self, item_id: u32, count: u32) -> Self {
        self.required_items.push((item_id, count));
        self
    }

    pub fn require_flag(mut self, flag_id: u32) -> Self {
        self.required_flags.push(flag_id);
        self
    }

    /// Whether every access prerequisite is currently met. An oracle answer
    /// of `None` counts as unmet.
    pub fn prerequisites_met(&self, oracle: &dyn StateOracle) -> bool {
        if self.members_only && !oracle.is_member().unwrap_or(false) {
            return false;
        }
        if !self
            .required_quests
            .iter()
            .all(|&q| oracle.quest_completed(q).unwrap_or(false))
        {
            return false;
        }
        if !self
            .required_skills
            .iter()
            .all(|&(skill, min)| oracle.skill_level(skill).unwrap_or(0) >= min)
        {
            return false;
        }
        if !self
            .required_items
            .iter()
            .all(|&(item, min)| oracle.item_count(item).unwrap_or(0) >= min)
        {
            return false;
        }
        self.required_flags
            .iter()
            .all(|&f| oracle.flag(f).unwrap_or(false))
    }
}

/// A location/resource prerequisite for a task entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRequirement {
    pub name: String,
    pub targets: Vec<LocationTarget>,
    /// Acceptable distance from a target, in tiles.
    pub tolerance: i32,
    /// Whether indirect transports (teleports, boats) may be used to get
    /// there. Consulted by the travel collaborator.
    #[serde(default)]
    pub allow_transport: bool,
    /// World the requirement must be fulfilled on, if any.
    #[serde(default)]
    pub required_world: Option<i32>,
    pub priority: RequirementPriority,
}

impl LocationRequirement {
    pub fn new(name: impl Into<String>, priority: RequirementPriority) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
            tolerance: 5,
            allow_transport: true,
            required_world: None,
            priority,
        }
    }

    pub fn with_target(mut self, target: LocationTarget) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_tolerance(mut self, tolerance: i32) -> Self {
        self.tolerance = tolerance.max(0);
        self
    }

    pub fn on_world(mut self, world: i32) -> Self {
        self.required_world = Some(world);
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.priority == RequirementPriority::Mandatory
    }

    /// Fulfilled when the current position is within tolerance of at least
    /// one prerequisite-satisfying target. Unknown position is never
    /// fulfilled.
    pub fn is_fulfilled(&self, oracle: &dyn StateOracle) -> bool {
        let Some(pos) = oracle.position() else {
            return false;
        };
        self.targets.iter().any(|t| {
            t.prerequisites_met(oracle) && pos.is_within(&t.point, self.tolerance)
        })
    }

    /// The closest prerequisite-satisfying target to `reference` (or to the
    /// current position when no reference is given). `None` when no target's
    /// prerequisites are met.
    pub fn best_target(
        &self,
        oracle: &dyn StateOracle,
        reference: Option<WorldPoint>,
    ) -> Option<&LocationTarget> {
        let from = reference.or_else(|| oracle.position())?;
        self.targets
            .iter()
            .filter(|t| t.prerequisites_met(oracle))
            .min_by_key(|t| from.distance_to(&t.point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::state::tests::{FixedOracle, NullOracle};

    fn oracle_at(point: WorldPoint) -> FixedOracle {
        let mut oracle = FixedOracle::default();
        oracle.position = Some(point);
        oracle
    }

    #[test]
    fn fulfilled_within_tolerance_of_open_target() {
        let req = LocationRequirement::new("mine", RequirementPriority::Mandatory)
            .with_target(LocationTarget::new("east", WorldPoint::new(3286, 3365, 0)))
            .with_tolerance(5);

        assert!(req.is_fulfilled(&oracle_at(WorldPoint::new(3288, 3363, 0))));
        assert!(!req.is_fulfilled(&oracle_at(WorldPoint::new(3300, 3365, 0))));
        assert!(!req.is_fulfilled(&NullOracle));
    }

    #[test]
    fn unmet_prerequisites_exclude_a_target() {
        let req = LocationRequirement::new("guild", RequirementPriority::Mandatory).with_target(
            LocationTarget::new("mining guild", WorldPoint::new(3046, 9756, 0))
                .require_skill(Skill::Mining, 60),
        );

        let mut oracle = oracle_at(WorldPoint::new(3046, 9756, 0));
        assert!(!req.is_fulfilled(&oracle));

        oracle.skills.insert(Skill::Mining, 60);
        assert!(req.is_fulfilled(&oracle));
    }

    #[test]
    fn best_target_is_closest_with_met_prerequisites() {
        let req = LocationRequirement::new("bank", RequirementPriority::Recommended)
            .with_target(
                LocationTarget::new("members bank", WorldPoint::new(3100, 3100, 0))
                    .members_only(),
            )
            .with_target(LocationTarget::new("far bank", WorldPoint::new(3500, 3500, 0)));

        // Free-to-play: the closer members bank is filtered out.
        let oracle = oracle_at(WorldPoint::new(3105, 3105, 0));
        let best = req.best_target(&oracle, None).unwrap();
        assert_eq!(best.name, "far bank");

        let mut member = oracle_at(WorldPoint::new(3105, 3105, 0));
        member.member = Some(true);
        let best = req.best_target(&member, None).unwrap();
        assert_eq!(best.name, "members bank");
    }

    #[test]
    fn no_eligible_target_yields_none() {
        let req = LocationRequirement::new("locked", RequirementPriority::Optional)
            .with_target(LocationTarget::new("quest area", WorldPoint::new(0, 0, 0)).require_quest(7));
        let oracle = oracle_at(WorldPoint::new(10, 10, 0));
        assert!(req.best_target(&oracle, None).is_none());
    }
}
