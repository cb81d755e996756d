//! Movement intent components.
//!
//! The intent is the only thing that differs between a player, an AI and an
//! inert item. Input code (keyboard, gamepad, behaviour trees) writes into
//! [`MovementIntent`]; the controller reads it once per tick.

use bevy::prelude::*;

/// Per-tick movement intent.
///
/// The three axes form the intent tensor: `forward` (+1 forward, -1 back),
/// `strafe` (+1 right, -1 left) and a vertical component derived from the
/// held jump/crouch actions.
///
/// # Example
///
/// ```rust
/// use quake_motion_controller::prelude::*;
///
/// let mut intent = MovementIntent::new();
/// intent.set_forward(1.0);
/// intent.set_jump_pressed(true);
/// assert_eq!(intent.tensor().z, 1.0);
/// assert_eq!(intent.tensor().y, 1.0);
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Forward/back intent (-1.0 to 1.0).
    pub forward: f32,
    /// Strafe intent (-1.0 = left, 1.0 = right).
    pub strafe: f32,
    /// Whether the jump action is currently held.
    ///
    /// Just a boolean; the controller derives pressed/released edges from it.
    pub jump_pressed: bool,
    /// Whether the crouch action is currently held.
    pub crouch_pressed: bool,
    pub(crate) jump_pressed_prev: bool,
    pub(crate) crouch_pressed_prev: bool,
    pub(crate) injected_jump: bool,
    /// Edges latched for the current tick.
    pub(crate) edges: InputEdges,
}

/// Action edges for one tick.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEdges {
    pub jump_pressed: bool,
    pub jump_released: bool,
    pub crouch_pressed: bool,
    pub crouch_released: bool,
}

impl MovementIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the forward intent (-1.0 = back, 1.0 = forward).
    pub fn set_forward(&mut self, value: f32) {
        self.forward = value.clamp(-1.0, 1.0);
    }

    /// Set the strafe intent (-1.0 = left, 1.0 = right).
    pub fn set_strafe(&mut self, value: f32) {
        self.strafe = value.clamp(-1.0, 1.0);
    }

    /// Set the held state of the jump action.
    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.jump_pressed = pressed;
    }

    /// Set the held state of the crouch action.
    pub fn set_crouch_pressed(&mut self, pressed: bool) {
        self.crouch_pressed = pressed;
    }

    /// Inject a jump press for the next tick without touching the held state.
    ///
    /// For AI callers that don't model a button.
    pub fn request_jump(&mut self) {
        self.injected_jump = true;
    }

    /// Clear directional intent and release both actions.
    pub fn clear(&mut self) {
        self.forward = 0.0;
        self.strafe = 0.0;
        self.jump_pressed = false;
        self.crouch_pressed = false;
    }

    /// Intent tensor as `(strafe, vertical, forward)`.
    pub fn tensor(&self) -> Vec3 {
        let vertical = self.jump_pressed as i8 - self.crouch_pressed as i8;
        Vec3::new(self.strafe, vertical as f32, self.forward)
    }

    /// Whether there is any directional intent.
    pub fn has_direction(&self) -> bool {
        self.forward.abs() > f32::EPSILON || self.strafe.abs() > f32::EPSILON
    }

    /// Edges latched for the current tick.
    pub fn edges(&self) -> InputEdges {
        self.edges
    }

    /// Derive this tick's edges from the held states. Called once per tick.
    pub(crate) fn latch_edges(&mut self) {
        self.edges = InputEdges {
            jump_pressed: (self.jump_pressed && !self.jump_pressed_prev) || self.injected_jump,
            jump_released: !self.jump_pressed && self.jump_pressed_prev,
            crouch_pressed: self.crouch_pressed && !self.crouch_pressed_prev,
            crouch_released: !self.crouch_pressed && self.crouch_pressed_prev,
        };
        self.jump_pressed_prev = self.jump_pressed;
        self.crouch_pressed_prev = self.crouch_pressed;
        self.injected_jump = false;
    }

    /// World-space horizontal wish direction.
    ///
    /// `orientation` is the body rotation; the forward and right basis vectors
    /// are flattened onto the plane perpendicular to `up`. Returns zero when
    /// there is no directional intent.
    pub fn wish_direction(&self, orientation: Quat, up: Vec3) -> Vec3 {
        if !self.has_direction() {
            return Vec3::ZERO;
        }
        let forward = (orientation * Vec3::NEG_Z).reject_from_normalized(up);
        let right = (orientation * Vec3::X).reject_from_normalized(up);
        (forward.normalize_or_zero() * self.forward + right.normalize_or_zero() * self.strafe)
            .normalize_or_zero()
    }
}
