//! World positions and block-granular keys

use crate::WorldId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A continuous position inside a named world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    /// Create a new location
    pub fn new(world: impl Into<WorldId>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Copy of this location shifted by the given deltas
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// Copy of this location raised by `height`
    pub fn up(&self, height: f64) -> Self {
        self.offset(0.0, height, 0.0)
    }

    pub fn same_world(&self, other: &Location) -> bool {
        self.world == other.world
    }

    /// Squared euclidean distance, or `None` across worlds
    pub fn distance_squared(&self, other: &Location) -> Option<f64> {
        if !self.same_world(other) {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some(dx * dx + dy * dy + dz * dz)
    }

    /// Same world and no further than `radius`
    pub fn within(&self, other: &Location, radius: f64) -> bool {
        self.distance_squared(other)
            .is_some_and(|d2| d2 <= radius * radius)
    }

    /// The block cell containing this location
    pub fn block(&self) -> BlockKey {
        BlockKey::new(
            self.world.clone(),
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// Block-granular coordinate key, rendered as `world:x:y:z`
///
/// Coarse on purpose: anything within the same block cell maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockKey {
    pub fn new(world: impl Into<WorldId>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Centre of the block cell
    pub fn center(&self) -> Location {
        Location::new(
            self.world.clone(),
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        )
    }
}

impl From<&Location> for BlockKey {
    fn from(location: &Location) -> Self {
        location.block()
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.world, self.x, self.y, self.z)
    }
}

/// Error returned when a stored key is not `world:x:y:z`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBlockKeyError(pub String);

impl fmt::Display for ParseBlockKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed block key: {}", self.0)
    }
}

impl std::error::Error for ParseBlockKeyError {}

impl FromStr for BlockKey {
    type Err = ParseBlockKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // World names may themselves contain ':', so split from the right
        let mut parts = s.rsplitn(4, ':');
        let err = || ParseBlockKeyError(s.to_string());
        let z = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let y = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let x = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let world = parts.next().filter(|w| !w.is_empty()).ok_or_else(err)?;
        Ok(Self::new(world, x, y, z))
    }
}
