//! Runtime physics modifiers.
//!
//! Surfaces, power-ups and scripted zones adjust movement through
//! [`PhysicsModifiers`] instead of editing [`TuningParameters`] directly.
//! An absolute override always beats the multiplier for the same quantity.

use bevy::prelude::*;

use crate::config::TuningParameters;

/// Transient multipliers and overrides layered over the tuning.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct PhysicsModifiers {
    pub drag_multiplier: f32,
    pub speed_multiplier: f32,
    pub acceleration_multiplier: f32,
    pub gravity_multiplier: f32,
    /// Replaces ground drag outright when set.
    pub drag_override: Option<f32>,
    /// Replaces the ground and water speed caps outright when set.
    pub speed_override: Option<f32>,
}

impl Default for PhysicsModifiers {
    fn default() -> Self {
        Self {
            drag_multiplier: 1.0,
            speed_multiplier: 1.0,
            acceleration_multiplier: 1.0,
            gravity_multiplier: 1.0,
            drag_override: None,
            speed_override: None,
        }
    }
}

impl PhysicsModifiers {
    pub fn set_drag_multiplier(&mut self, multiplier: f32) {
        self.drag_multiplier = multiplier;
    }

    pub fn set_speed_multiplier(&mut self, multiplier: f32) {
        self.speed_multiplier = multiplier;
    }

    pub fn set_acceleration_multiplier(&mut self, multiplier: f32) {
        self.acceleration_multiplier = multiplier;
    }

    pub fn set_gravity_multiplier(&mut self, multiplier: f32) {
        self.gravity_multiplier = multiplier;
    }

    pub fn set_drag_override(&mut self, drag: Option<f32>) {
        self.drag_override = drag;
    }

    pub fn set_speed_override(&mut self, speed: Option<f32>) {
        self.speed_override = speed;
    }

    /// Reset multipliers to 1.0 and drop both overrides.
    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    /// Whether anything differs from the defaults.
    pub fn is_active(&self) -> bool {
        *self != Self::default()
    }

    pub fn effective_ground_drag(&self, tuning: &TuningParameters) -> f32 {
        self.drag_override
            .unwrap_or(tuning.ground_drag * self.drag_multiplier)
    }

    pub fn effective_water_drag(&self, tuning: &TuningParameters) -> f32 {
        tuning.water_drag * self.drag_multiplier
    }

    pub fn effective_ground_speed(&self, tuning: &TuningParameters) -> f32 {
        self.speed_override
            .unwrap_or(tuning.max_ground_speed * self.speed_multiplier)
    }

    pub fn effective_water_speed(&self, tuning: &TuningParameters) -> f32 {
        self.speed_override
            .unwrap_or(tuning.max_water_speed * self.speed_multiplier)
    }

    /// Air cap ignores the speed override.
    pub fn effective_air_speed(&self, tuning: &TuningParameters) -> f32 {
        tuning.max_air_speed * self.speed_multiplier
    }

    pub fn effective_acceleration(&self, tuning: &TuningParameters) -> f32 {
        tuning.ground_acceleration() * self.acceleration_multiplier
    }

    pub fn effective_gravity_scale(&self, tuning: &TuningParameters) -> f32 {
        tuning.gravity_scale * self.gravity_multiplier
    }
}
