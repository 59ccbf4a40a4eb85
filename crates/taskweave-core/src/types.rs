//! World coordinate and identity types shared across the workspace.

use serde::{Deserialize, Serialize};

/// A tile coordinate in the game world: x/y position plus vertical plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: i32,
    pub y: i32,
    pub plane: i32,
}

impl WorldPoint {
    pub const fn new(x: i32, y: i32, plane: i32) -> Self {
        Self { x, y, plane }
    }

    /// Chebyshev distance to another point. Points on different planes are
    /// treated as unreachable (`i32::MAX`), matching how tile distance is
    /// measured in-game.
    pub fn distance_to(&self, other: &WorldPoint) -> i32 {
        if self.plane != other.plane {
            return i32::MAX;
        }
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Whether `other` lies within `radius` tiles on the same plane.
    pub fn is_within(&self, other: &WorldPoint, radius: i32) -> bool {
        self.distance_to(other) <= radius
    }
}

impl std::fmt::Display for WorldPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.plane)
    }
}

/// Trainable skills a location prerequisite can gate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    Attack,
    Strength,
    Defence,
    Ranged,
    Magic,
    Prayer,
    Hitpoints,
    Agility,
    Herblore,
    Thieving,
    Crafting,
    Fletching,
    Slayer,
    Hunter,
    Mining,
    Smithing,
    Fishing,
    Cooking,
    Firemaking,
    Woodcutting,
    Farming,
    Runecraft,
    Construction,
    Sailing,
}
