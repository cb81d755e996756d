//! Per-tick motion state and regime selection.
//!
//! [`MotionState`] is derived from the sensors at the start of every tick.
//! The marker components ([`Grounded`], [`Airborne`], [`Submerged`]) mirror
//! the active regime so that gameplay code can filter on them in queries.

use bevy::prelude::*;

use crate::detection::Sensors;

/// Slope angles at or below this (degrees) count as flat ground.
pub const MIN_SLOPE_ANGLE_DEGREES: f32 = 0.1;

/// Movement-physics mode. Exactly one is active per tick.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Regime {
    Ground,
    #[default]
    Air,
    Water,
}

/// Authoritative motion state of a controlled entity.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct MotionState {
    /// Velocity the controller commanded this tick.
    pub linear_velocity: Vec3,
    /// World-space horizontal direction the entity wants to travel in.
    pub wish_direction: Vec3,
    pub grounded: bool,
    pub on_slope: bool,
    pub in_water: bool,
    pub regime: Regime,
    /// Walkable slope normal, set only while `on_slope`.
    pub slope_normal: Option<Vec3>,
    /// Grounded flag of the previous tick (edge detection).
    pub was_grounded: bool,
}

impl MotionState {
    /// Re-derive the flags and regime from this tick's sensor readings.
    ///
    /// A walkable slope contact forces `grounded`. A slope at or beyond the
    /// walkable limit leaves `grounded` as the ground probe reports it but
    /// drives the entity with the air regime.
    pub fn refresh(&mut self, sensors: &Sensors, up: Vec3, max_slope_angle_degrees: f32) {
        self.was_grounded = self.grounded;
        self.in_water = sensors.submerged;
        self.on_slope = false;
        self.slope_normal = None;

        let slope_angle = sensors.slope.as_ref().map(|hit| hit.angle_from(up));
        let too_steep = slope_angle.is_some_and(|angle| angle >= max_slope_angle_degrees);

        if let (Some(angle), Some(normal)) = (slope_angle, sensors.slope_normal()) {
            if angle > MIN_SLOPE_ANGLE_DEGREES && angle < max_slope_angle_degrees {
                self.on_slope = true;
                self.slope_normal = Some(normal);
            }
        }

        self.grounded = self.on_slope || sensors.ground_detected();

        self.regime = if self.on_slope || (self.grounded && !too_steep) {
            Regime::Ground
        } else if self.in_water {
            Regime::Water
        } else {
            Regime::Air
        };
    }

    /// Whether the grounded flag changed since the previous tick.
    pub fn grounded_changed(&self) -> bool {
        self.grounded != self.was_grounded
    }

    /// Whether the entity touched down this tick.
    pub fn just_landed(&self) -> bool {
        self.grounded && !self.was_grounded
    }
}

/// Marker: the entity is in the ground regime.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker: the entity is in the air regime.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker: the entity is in the water regime.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Submerged;
