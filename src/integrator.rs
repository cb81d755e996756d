//! Regime-dependent velocity integration.
//!
//! Quake-style movement: friction first (ground and water only), then
//! acceleration toward the wish direction clamped against the regime's
//! speed cap, then gravity in the air. Everything here is pure math over
//! plain values so it can be tested without a world.

use bevy::prelude::*;

use crate::config::{MotionGravity, TuningParameters};
use crate::modifiers::PhysicsModifiers;
use crate::state::Regime;

/// Speeds at or below this are treated as stationary by friction.
pub const FRICTION_EPSILON: f32 = 1e-5;

/// Minimum speed friction is computed against, so slow bodies stop quickly.
pub const STOP_SPEED: f32 = 0.5;

/// Effective values for the active regime after modifiers are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeParams {
    pub max_speed: f32,
    pub acceleration: f32,
    /// Friction coefficient; `None` in the air.
    pub drag: Option<f32>,
    /// Gravity acceleration; `None` outside the air regime.
    pub gravity: Option<Vec3>,
}

impl RegimeParams {
    pub fn resolve(
        regime: Regime,
        tuning: &TuningParameters,
        modifiers: &PhysicsModifiers,
        gravity: &MotionGravity,
    ) -> Self {
        let acceleration = modifiers.effective_acceleration(tuning);
        match regime {
            Regime::Ground => Self {
                max_speed: modifiers.effective_ground_speed(tuning),
                acceleration,
                drag: Some(modifiers.effective_ground_drag(tuning)),
                gravity: None,
            },
            Regime::Water => Self {
                max_speed: modifiers.effective_water_speed(tuning),
                acceleration,
                drag: Some(modifiers.effective_water_drag(tuning)),
                gravity: None,
            },
            Regime::Air => Self {
                max_speed: modifiers.effective_air_speed(tuning),
                acceleration,
                drag: None,
                gravity: Some(gravity.acceleration() * modifiers.effective_gravity_scale(tuning)),
            },
        }
    }
}

/// Apply friction for one tick. Never reverses the direction of `velocity`.
pub fn apply_friction(velocity: Vec3, drag: f32, dt: f32) -> Vec3 {
    let speed = velocity.length();
    if speed <= FRICTION_EPSILON {
        return velocity;
    }
    let drop = speed.max(STOP_SPEED) * drag * dt;
    let new_speed = (speed - drop).max(0.0);
    if new_speed == 0.0 {
        return Vec3::ZERO;
    }
    velocity * (new_speed / speed)
}

/// Accelerate toward `wish_dir` without pushing the projected speed past `max_speed`.
///
/// `wish_dir` must be unit length or zero.
pub fn accelerate(velocity: Vec3, wish_dir: Vec3, max_speed: f32, acceleration: f32, dt: f32) -> Vec3 {
    if wish_dir == Vec3::ZERO {
        return velocity;
    }
    let current_speed = velocity.dot(wish_dir);
    let add_speed = (max_speed - current_speed).clamp(0.0, acceleration * dt);
    velocity + wish_dir * add_speed
}

/// Project a direction onto a plane and re-normalize it.
///
/// Returns `direction` unchanged for a degenerate normal, and zero when the
/// projection collapses.
pub fn project_on_plane(direction: Vec3, normal: Vec3) -> Vec3 {
    let Some(normal) = normal.try_normalize() else {
        return direction;
    };
    if direction == Vec3::ZERO {
        return Vec3::ZERO;
    }
    direction.reject_from_normalized(normal).normalize_or_zero()
}

/// One tick of integration.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationStep {
    pub velocity: Vec3,
    pub wish_direction: Vec3,
    pub regime: Regime,
    pub slope_normal: Option<Vec3>,
    pub dt: f32,
}

impl IntegrationStep {
    /// Velocity after friction, acceleration and gravity for this tick.
    pub fn integrate(&self, params: &RegimeParams) -> Vec3 {
        let wish = match (self.regime, self.slope_normal) {
            (Regime::Ground, Some(normal)) => project_on_plane(self.wish_direction, normal),
            _ => self.wish_direction,
        };

        let mut velocity = self.velocity;
        if let Some(drag) = params.drag {
            velocity = apply_friction(velocity, drag, self.dt);
        }
        velocity = accelerate(velocity, wish, params.max_speed, params.acceleration, self.dt);
        if let Some(gravity) = params.gravity {
            velocity += gravity * self.dt;
        }
        velocity
    }
}

/// Force that realizes `target` from `current` within one tick.
pub fn velocity_change_force(current: Vec3, target: Vec3, mass: f32, dt: f32) -> Vec3 {
    if dt <= 0.0 {
        return Vec3::ZERO;
    }
    (target - current) * mass / dt
}
