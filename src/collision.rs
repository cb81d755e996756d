//! Probe hit data.
//!
//! These structures hold the results of the physics queries (raycasts and
//! shapecasts) the backend runs for the environment sensors.

use bevy::prelude::*;

/// Information about a raycast/shapecast collision.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionData {
    /// Distance to the hit point.
    pub distance: f32,
    /// Normal of the surface at hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if any).
    pub entity: Option<Entity>,
}

impl CollisionData {
    /// Create a collision result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }

    /// Angle between the surface normal and `up`, in degrees.
    ///
    /// Returns 0 for a degenerate normal.
    pub fn angle_from(&self, up: Vec3) -> f32 {
        let normal = self.normal.normalize_or_zero();
        if normal == Vec3::ZERO {
            return 0.0;
        }
        up.angle_between(normal).to_degrees()
    }
}
