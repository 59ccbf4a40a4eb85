//! Collaborator traits: the narrow seams between the scheduler core and the
//! host game client.
//!
//! Every query is read-only and may return `None` while the underlying session
//! is still loading; the engine treats "unknown" as "not yet satisfied", never
//! as an error. Hosts implement these traits; the engine only holds `Arc<dyn>`s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Skill, WorldPoint};

/// Read-only view of the player and world state, plus the clock.
///
/// The oracle is the engine's single time source so tests can freeze it.
pub trait StateOracle: Send + Sync {
    /// Current wall-clock instant.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Current player tile, or `None` if not logged in / still loading.
    fn position(&self) -> Option<WorldPoint>;

    /// Whether the session is ready for queries at all.
    fn session_ready(&self) -> bool;

    fn is_member(&self) -> Option<bool>;

    fn skill_level(&self, skill: Skill) -> Option<u32>;

    /// Whether the quest with the given id is completed.
    fn quest_completed(&self, quest_id: u32) -> Option<bool>;

    /// Total count of an item across inventory and equipment.
    fn item_count(&self, item_id: u32) -> Option<u32>;

    /// Arbitrary boolean world flag (varbit-style), by id.
    fn flag(&self, flag_id: u32) -> Option<bool>;
}

/// Long-running travel toward a target tile.
#[async_trait]
pub trait TravelProvider: Send + Sync {
    /// Begin (or continue) traveling toward `target`, returning once the
    /// pathing routine considers itself done. May block its worker for a long
    /// time; the watchdog supervises it from outside.
    async fn travel_to(&self, target: WorldPoint, tolerance: i32) -> bool;

    /// Cancel any in-flight travel and clear the active destination so
    /// concurrent sub-tasks observe "no active target".
    fn cancel_travel(&self);

    /// Feasibility pre-check without moving.
    fn can_reach(&self, target: WorldPoint) -> bool;

    /// Whether the player is currently in motion.
    fn is_moving(&self) -> bool;
}

/// Relocation to a different world instance.
#[async_trait]
pub trait WorldHopper: Send + Sync {
    /// Request a hop to the given world. Returns whether the request was
    /// accepted; success is verified afterwards via `current_world`.
    async fn attempt_relocate(&self, world: i32) -> bool;

    fn is_relocating(&self) -> bool;

    fn current_world(&self) -> i32;

    /// Whether the given world is open to this account (membership, world
    /// type, population caps).
    fn can_access_world(&self, world: i32) -> bool;
}
