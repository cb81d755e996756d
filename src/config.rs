//! Controller configuration components.
//!
//! This module defines the authored tuning of a motion controller, the
//! immutable baseline captured from it, probe lengths, external-force
//! tuning, and the process-wide gravity resource.

use bevy::prelude::*;

use crate::error::ControllerError;

/// Longest tick the controller will integrate in one step (seconds).
pub const MAX_TICK_SECONDS: f32 = 0.25;

/// Gravity applied by the integrator in the air regime.
///
/// The body's own engine gravity is disabled at initialization; this is the
/// only gravity a controlled entity receives.
#[derive(Resource, Reflect, Debug, Clone, Copy)]
#[reflect(Resource)]
pub struct MotionGravity {
    /// Unit direction gravity pulls toward.
    pub direction: Vec3,
    /// Acceleration magnitude (units/second^2).
    pub magnitude: f32,
}

impl Default for MotionGravity {
    fn default() -> Self {
        Self {
            direction: Vec3::NEG_Y,
            magnitude: 9.8,
        }
    }
}

impl MotionGravity {
    pub fn new(direction: Vec3, magnitude: f32) -> Self {
        Self {
            direction: direction.normalize_or(Vec3::NEG_Y),
            magnitude,
        }
    }

    /// World up, opposite to gravity.
    #[inline]
    pub fn up(&self) -> Vec3 {
        -self.direction
    }

    /// Gravity as an acceleration vector.
    #[inline]
    pub fn acceleration(&self) -> Vec3 {
        self.direction * self.magnitude
    }
}

/// Movement tuning for a controlled entity.
///
/// Crouching and save/load rewrite some of these values at runtime; the
/// authored values are kept in [`TuningBaseline`].
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct TuningParameters {
    // === Speed caps ===
    /// Maximum drive speed on ground (units/second).
    pub max_ground_speed: f32,
    /// Maximum drive speed in the air.
    pub max_air_speed: f32,
    /// Maximum drive speed while submerged.
    pub max_water_speed: f32,

    /// Ground acceleration = `max_ground_speed * acceleration_multiplier`.
    pub acceleration_multiplier: f32,

    // === Friction ===
    /// Friction coefficient on ground and slopes.
    pub ground_drag: f32,
    /// Friction coefficient while submerged.
    pub water_drag: f32,

    /// Scale applied to [`MotionGravity`] in the air regime.
    pub gravity_scale: f32,

    /// Walkable slope limit in degrees.
    pub max_slope_angle_degrees: f32,

    // === Jump ===
    /// Jump impulse strength.
    pub jump_force: f32,
    /// Coyote time window in seconds.
    pub coyote_time: f32,
    /// Post-jump hold window on flat ground (seconds).
    pub jump_hold_window: f32,
    /// Post-jump hold window on slopes (seconds).
    pub slope_jump_hold_window: f32,
    /// Swim-up force = `jump_force * swim_force_multiplier`.
    pub swim_force_multiplier: f32,

    // === Crouch ===
    /// Vertical body scale while crouched.
    pub crouch_scale_y: f32,
    /// Ground speed cap while crouched.
    pub crouch_speed: f32,
    /// Downward push on uncrouch = `jump_force * uncrouch_push_multiplier`.
    pub uncrouch_push_multiplier: f32,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            max_ground_speed: 10.0,
            max_air_speed: 12.0,
            max_water_speed: 5.0,
            acceleration_multiplier: 10.0,

            ground_drag: 8.0,
            water_drag: 4.0,

            gravity_scale: 6.0,
            max_slope_angle_degrees: 45.0,

            jump_force: 10.0,
            coyote_time: 0.2,
            jump_hold_window: 0.2,
            slope_jump_hold_window: 0.6,
            swim_force_multiplier: 1.5,

            crouch_scale_y: 0.65,
            crouch_speed: 7.6,
            uncrouch_push_multiplier: 2.0,
        }
    }
}

impl TuningParameters {
    /// Ground acceleration derived from the current ground speed cap.
    #[inline]
    pub fn ground_acceleration(&self) -> f32 {
        self.max_ground_speed * self.acceleration_multiplier
    }

    /// Tuning for the player character.
    pub fn player() -> Self {
        Self::default()
    }

    /// Tuning for AI-controlled characters.
    pub fn ai() -> Self {
        Self {
            max_ground_speed: 7.0,
            max_air_speed: 8.0,
            max_water_speed: 3.5,
            jump_force: 8.0,
            coyote_time: 0.1,
            ..default()
        }
    }

    /// Tuning for inert items: no drive, friction and gravity only.
    pub fn item() -> Self {
        Self {
            max_ground_speed: 0.0,
            max_air_speed: 0.0,
            max_water_speed: 0.0,
            jump_force: 0.0,
            coyote_time: 0.0,
            ..default()
        }
    }

    /// Builder: set ground speed cap.
    pub fn with_max_ground_speed(mut self, speed: f32) -> Self {
        self.max_ground_speed = speed;
        self
    }

    /// Builder: set air speed cap.
    pub fn with_max_air_speed(mut self, speed: f32) -> Self {
        self.max_air_speed = speed;
        self
    }

    /// Builder: set water speed cap.
    pub fn with_max_water_speed(mut self, speed: f32) -> Self {
        self.max_water_speed = speed;
        self
    }

    /// Builder: set ground and water drag.
    pub fn with_drag(mut self, ground: f32, water: f32) -> Self {
        self.ground_drag = ground;
        self.water_drag = water;
        self
    }

    /// Builder: set gravity scale.
    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Builder: set jump impulse.
    pub fn with_jump_force(mut self, force: f32) -> Self {
        self.jump_force = force;
        self
    }

    /// Builder: set coyote time.
    pub fn with_coyote_time(mut self, time: f32) -> Self {
        self.coyote_time = time;
        self
    }

    /// Builder: set walkable slope limit (degrees).
    pub fn with_max_slope_angle(mut self, degrees: f32) -> Self {
        self.max_slope_angle_degrees = degrees;
        self
    }

    /// Builder: set crouch scale and speed.
    pub fn with_crouch(mut self, scale_y: f32, speed: f32) -> Self {
        self.crouch_scale_y = scale_y;
        self.crouch_speed = speed;
        self
    }

    /// Check the values for ones the integrator cannot work with.
    pub fn validate(&self) -> Result<(), ControllerError> {
        let finite_non_negative = [
            ("max_ground_speed", self.max_ground_speed),
            ("max_air_speed", self.max_air_speed),
            ("max_water_speed", self.max_water_speed),
            ("acceleration_multiplier", self.acceleration_multiplier),
            ("ground_drag", self.ground_drag),
            ("water_drag", self.water_drag),
            ("jump_force", self.jump_force),
            ("coyote_time", self.coyote_time),
            ("crouch_speed", self.crouch_speed),
        ];
        for (field, value) in finite_non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ControllerError::InvalidTuning { field, value });
            }
        }
        if !(self.crouch_scale_y > 0.0 && self.crouch_scale_y <= 1.0) {
            return Err(ControllerError::InvalidTuning {
                field: "crouch_scale_y",
                value: self.crouch_scale_y,
            });
        }
        if !(self.max_slope_angle_degrees > 0.0 && self.max_slope_angle_degrees < 90.0) {
            return Err(ControllerError::InvalidTuning {
                field: "max_slope_angle_degrees",
                value: self.max_slope_angle_degrees,
            });
        }
        Ok(())
    }
}

/// Snapshot of the authored [`TuningParameters`].
///
/// Inserted once, the first tick a controller is seen. There is no way to
/// mutate it afterwards.
#[derive(Component, Debug, Clone, Copy)]
pub struct TuningBaseline(TuningParameters);

impl TuningBaseline {
    pub(crate) fn capture(tuning: &TuningParameters) -> Self {
        Self(*tuning)
    }

    pub fn get(&self) -> &TuningParameters {
        &self.0
    }

    /// Restore every tunable to its authored value.
    pub fn reset(&self, tuning: &mut TuningParameters) {
        *tuning = self.0;
    }
}

/// Probe lengths and sizes for the environment sensors.
///
/// Only the ground probe is required; a missing optional probe reads as
/// "no contact" (and an always-clear ceiling).
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct ProbeConfig {
    /// Ground ray length measured from the body origin.
    pub ground_probe: Option<f32>,
    /// Slope ray length measured from the body origin.
    pub slope_probe: Option<f32>,
    /// Resting-contact cast length (platform attachment).
    pub resting_probe: Option<f32>,
    /// Radius of the resting-contact and ceiling shapes.
    pub probe_radius: f32,
    /// Ceiling clearance cast length, measured at standing height.
    pub ceiling_probe: Option<f32>,
    /// Radius of the submersion overlap test.
    pub water_probe_radius: Option<f32>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ground_probe: Some(1.1),
            slope_probe: Some(1.5),
            resting_probe: Some(1.2),
            probe_radius: 0.3,
            ceiling_probe: Some(1.2),
            water_probe_radius: Some(0.4),
        }
    }
}

impl ProbeConfig {
    /// Builder: set ground probe length.
    pub fn with_ground_probe(mut self, length: f32) -> Self {
        self.ground_probe = Some(length);
        self
    }

    /// Builder: remove the ceiling probe (uncrouch is never blocked).
    pub fn without_ceiling_probe(mut self) -> Self {
        self.ceiling_probe = None;
        self
    }

    /// Builder: remove the resting-contact probe (no platform attachment).
    pub fn without_resting_probe(mut self) -> Self {
        self.resting_probe = None;
        self
    }
}

/// Tuning for the external force ledger.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct ExternalForceConfig {
    /// Largest force magnitude accepted per application.
    pub max_force: f32,
    /// Gain applied to every accepted force.
    pub gain: f32,
    /// Fraction of external velocity retained after one second.
    pub damping: f32,
    /// Magnitude below which external velocity is treated as zero.
    pub cutoff: f32,
    /// Blend factor multiplier while grounded.
    pub grounded_blend: f32,
    /// Blend factor multiplier while the controller has directional input.
    pub input_blend: f32,
    /// Bookkeeping lifetime of impulse entries (seconds).
    pub impulse_lifetime: f32,
    /// Closing speed above which a dynamic contact injects an impulse.
    pub impact_threshold: f32,
    /// Impulse per unit of closing speed.
    pub impact_scale: f32,
}

impl Default for ExternalForceConfig {
    fn default() -> Self {
        Self {
            max_force: 50.0,
            gain: 1.0,
            damping: 0.01,
            cutoff: 0.05,
            grounded_blend: 0.5,
            input_blend: 0.6,
            impulse_lifetime: 0.25,
            impact_threshold: 2.0,
            impact_scale: 0.5,
        }
    }
}
