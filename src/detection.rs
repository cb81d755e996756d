//! Environment sensor readings.
//!
//! The backend refreshes [`Sensors`] once per tick from its probes. Every
//! other system treats the readings as read-only for the rest of the tick.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::collision::CollisionData;

/// Probe readings for a single tick.
///
/// Each probe stores `Option<CollisionData>` with the full hit information,
/// `None` meaning the probe reported no contact.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct Sensors {
    /// Ground probe hit (short ray straight down).
    #[reflect(ignore)]
    pub ground: Option<CollisionData>,
    /// Slope probe hit, carrying the surface normal.
    #[reflect(ignore)]
    pub slope: Option<CollisionData>,
    /// Whether the submersion probe overlaps a water volume.
    pub submerged: bool,
    /// Surface reported by the resting-contact probe (platform attachment).
    pub resting_contact: Option<Entity>,
    /// Ceiling clearance probe hit (crouch release gating).
    #[reflect(ignore)]
    pub ceiling: Option<CollisionData>,
}

impl Sensors {
    /// Whether the ground probe is colliding.
    pub fn ground_detected(&self) -> bool {
        self.ground.is_some()
    }

    /// Entity under the ground probe, if any.
    pub fn ground_entity(&self) -> Option<Entity> {
        self.ground.as_ref().and_then(|g| g.entity)
    }

    /// Slope contact normal, if the slope probe is colliding.
    pub fn slope_normal(&self) -> Option<Vec3> {
        self.slope.as_ref().map(|s| s.normal)
    }

    /// Whether the ceiling clearance probe is free.
    pub fn ceiling_clear(&self) -> bool {
        self.ceiling.is_none()
    }

    /// Reset all readings (called by backends before probing).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Marker for volumes that count as water for the submersion probe.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct WaterVolume;

/// Free-form metadata attached to world geometry.
///
/// Keys are matched case-insensitively.
#[derive(Component, Debug, Clone, Default)]
pub struct SurfaceMetadata(HashMap<String, String>);

impl SurfaceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into().to_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Sound tag of this surface.
    pub fn tag(&self) -> SurfaceTag {
        self.get(SurfaceTag::METADATA_KEY)
            .map(SurfaceTag::parse)
            .unwrap_or_default()
    }
}

/// Closed set of surface kinds used to pick footstep variants.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceTag {
    #[default]
    Generic,
    Iron,
    Stone,
}

impl SurfaceTag {
    /// Metadata key the tag is read from.
    pub const METADATA_KEY: &'static str = "sound";

    /// Parse a metadata value. Unknown values map to [`SurfaceTag::Generic`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "iron" => Self::Iron,
            "stone" => Self::Stone,
            _ => Self::Generic,
        }
    }
}
