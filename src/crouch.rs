//! Crouch state machine.
//!
//! Crouching shrinks the body vertically and lowers the ground speed cap.
//! Standing back up is only a request: it waits, for as long as it takes,
//! until the ceiling probe is clear.

use bevy::prelude::*;

use crate::config::{TuningBaseline, TuningParameters};
use crate::intent::InputEdges;

#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct CrouchState {
    pub is_crouching: bool,
    pub wants_to_uncrouch: bool,
    /// Standing vertical scale, captured once at initialization.
    pub original_scale_y: f32,
}

/// Inputs of one crouch tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrouchInput {
    pub edges: InputEdges,
    pub crouch_held: bool,
    pub grounded: bool,
    pub submerged: bool,
    pub ceiling_clear: bool,
}

/// Effects the crouch machine asks for this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrouchOutcome {
    /// New vertical body scale, if it changed.
    pub scale_y: Option<f32>,
    /// Downward force magnitude (underwater dive or uncrouch settle).
    pub down_force: Option<f32>,
}

impl CrouchState {
    pub fn new(original_scale_y: f32) -> Self {
        Self {
            original_scale_y,
            ..default()
        }
    }

    /// Enter the crouch. Returns the crouched scale, or `None` if already
    /// crouching.
    pub fn start_crouch(&mut self, tuning: &mut TuningParameters) -> Option<f32> {
        self.wants_to_uncrouch = false;
        if self.is_crouching {
            return None;
        }
        self.is_crouching = true;
        tuning.max_ground_speed = tuning.crouch_speed;
        Some(self.original_scale_y * tuning.crouch_scale_y)
    }

    /// Ask to stand up at the next clear tick.
    pub fn request_uncrouch(&mut self) {
        if self.is_crouching {
            self.wants_to_uncrouch = true;
        }
    }

    /// Stand up if requested and the ceiling is clear. Returns the restored scale.
    pub fn try_uncrouch(
        &mut self,
        ceiling_clear: bool,
        tuning: &mut TuningParameters,
        baseline: &TuningBaseline,
    ) -> Option<f32> {
        if !(self.is_crouching && self.wants_to_uncrouch && ceiling_clear) {
            return None;
        }
        self.is_crouching = false;
        self.wants_to_uncrouch = false;
        tuning.max_ground_speed = baseline.get().max_ground_speed;
        Some(self.original_scale_y)
    }

    /// Advance one tick.
    pub fn tick(
        &mut self,
        input: CrouchInput,
        tuning: &mut TuningParameters,
        baseline: &TuningBaseline,
    ) -> CrouchOutcome {
        let mut outcome = CrouchOutcome::default();

        if input.submerged {
            if input.crouch_held {
                outcome.down_force = Some(tuning.jump_force);
            }
        } else if input.edges.crouch_pressed {
            outcome.scale_y = self.start_crouch(tuning);
        }

        if input.edges.crouch_released {
            self.request_uncrouch();
        }

        if let Some(scale) = self.try_uncrouch(input.ceiling_clear, tuning, baseline) {
            outcome.scale_y = Some(scale);
            if input.grounded {
                outcome.down_force = Some(tuning.jump_force * tuning.uncrouch_push_multiplier);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (CrouchState, TuningParameters, TuningBaseline) {
        let tuning = TuningParameters::default();
        let baseline = TuningBaseline::capture(&tuning);
        (CrouchState::new(1.0), tuning, baseline)
    }

    fn press() -> CrouchInput {
        CrouchInput {
            edges: InputEdges {
                crouch_pressed: true,
                ..default()
            },
            crouch_held: true,
            grounded: true,
            ceiling_clear: true,
            ..default()
        }
    }

    fn release(ceiling_clear: bool) -> CrouchInput {
        CrouchInput {
            edges: InputEdges {
                crouch_released: true,
                ..default()
            },
            grounded: true,
            ceiling_clear,
            ..default()
        }
    }

    fn idle(ceiling_clear: bool) -> CrouchInput {
        CrouchInput {
            grounded: true,
            ceiling_clear,
            ..default()
        }
    }

    #[test]
    fn crouch_scales_and_slows() {
        let (mut crouch, mut tuning, baseline) = setup();
        let outcome = crouch.tick(press(), &mut tuning, &baseline);
        assert_eq!(outcome.scale_y, Some(0.65));
        assert_eq!(tuning.max_ground_speed, 7.6);
        assert!(crouch.is_crouching);
    }

    #[test]
    fn start_crouch_is_idempotent() {
        let (mut crouch, mut tuning, _) = setup();
        let first = crouch.start_crouch(&mut tuning);
        let speed_after_first = tuning.max_ground_speed;
        let second = crouch.start_crouch(&mut tuning);

        assert_eq!(first, Some(0.65));
        assert_eq!(second, None, "no further scale change");
        assert_eq!(tuning.max_ground_speed, speed_after_first);
    }

    #[test]
    fn blocked_ceiling_holds_the_crouch() {
        let (mut crouch, mut tuning, baseline) = setup();
        crouch.tick(press(), &mut tuning, &baseline);
        let outcome = crouch.tick(release(false), &mut tuning, &baseline);
        assert_eq!(outcome.scale_y, None);

        for _ in 0..500 {
            let outcome = crouch.tick(idle(false), &mut tuning, &baseline);
            assert_eq!(outcome.scale_y, None);
            assert!(crouch.is_crouching);
        }
        assert!(crouch.wants_to_uncrouch);

        let outcome = crouch.tick(idle(true), &mut tuning, &baseline);
        assert_eq!(outcome.scale_y, Some(1.0));
        assert!(!crouch.is_crouching);
        assert_eq!(tuning.max_ground_speed, baseline.get().max_ground_speed);
    }

    #[test]
    fn grounded_uncrouch_pushes_down() {
        let (mut crouch, mut tuning, baseline) = setup();
        crouch.tick(press(), &mut tuning, &baseline);
        let outcome = crouch.tick(release(true), &mut tuning, &baseline);
        assert_eq!(outcome.scale_y, Some(1.0));
        assert_eq!(
            outcome.down_force,
            Some(tuning.jump_force * tuning.uncrouch_push_multiplier)
        );
    }

    #[test]
    fn airborne_uncrouch_has_no_push() {
        let (mut crouch, mut tuning, baseline) = setup();
        crouch.tick(press(), &mut tuning, &baseline);
        let mut input = release(true);
        input.grounded = false;
        let outcome = crouch.tick(input, &mut tuning, &baseline);
        assert_eq!(outcome.scale_y, Some(1.0));
        assert_eq!(outcome.down_force, None);
    }

    #[test]
    fn pressing_again_cancels_a_pending_uncrouch() {
        let (mut crouch, mut tuning, baseline) = setup();
        crouch.tick(press(), &mut tuning, &baseline);
        crouch.tick(release(false), &mut tuning, &baseline);
        crouch.tick(press(), &mut tuning, &baseline);
        assert!(!crouch.wants_to_uncrouch);

        let outcome = crouch.tick(idle(true), &mut tuning, &baseline);
        assert_eq!(outcome.scale_y, None);
        assert!(crouch.is_crouching);
    }

    #[test]
    fn underwater_crouch_dives() {
        let (mut crouch, mut tuning, baseline) = setup();
        let mut input = press();
        input.submerged = true;
        let outcome = crouch.tick(input, &mut tuning, &baseline);
        assert_eq!(outcome.scale_y, None);
        assert_eq!(outcome.down_force, Some(tuning.jump_force));
        assert!(!crouch.is_crouching);
    }
}
