//! Jump state machine with coyote time.
//!
//! A jump executes when it is wanted, the entity left the ground less than
//! `coyote_time` seconds ago, and it is not submerged. While submerged a
//! held jump swims upward instead. `jumped` blocks re-triggering until the
//! post-jump hold window has elapsed on the ground or the button is
//! released.

use bevy::prelude::*;

use crate::config::TuningParameters;
use crate::intent::InputEdges;

/// Jump bookkeeping for one entity.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct JumpState {
    pub wants_to_jump: bool,
    pub time_since_grounded: f32,
    pub time_since_jump_pressed: f32,
    pub jumped: bool,
    pub jump_hold_timer: f32,
}

/// What the jump machine asks the body to do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JumpAction {
    None,
    /// Apply an upward impulse of this magnitude.
    Jump(f32),
    /// Apply an upward swim force of this magnitude.
    Swim(f32),
}

/// Inputs of one jump tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct JumpInput {
    pub edges: InputEdges,
    pub jump_held: bool,
    pub grounded: bool,
    pub on_slope: bool,
    pub submerged: bool,
    pub dt: f32,
}

impl JumpState {
    /// Whether the coyote window is still open.
    pub fn can_jump(&self, coyote_time: f32) -> bool {
        self.time_since_grounded < coyote_time
    }

    pub fn press(&mut self) {
        self.wants_to_jump = true;
        self.time_since_jump_pressed = 0.0;
    }

    /// Releasing always clears `jumped`, on flat ground and slopes alike.
    pub fn release(&mut self) {
        self.wants_to_jump = false;
        self.jumped = false;
        self.jump_hold_timer = 0.0;
    }

    /// Advance one tick.
    pub fn tick(&mut self, input: JumpInput, tuning: &TuningParameters) -> JumpAction {
        if input.edges.jump_pressed {
            self.press();
        }
        if input.edges.jump_released {
            self.release();
        }
        self.time_since_jump_pressed += input.dt;

        if input.grounded {
            self.time_since_grounded = 0.0;
        }

        if self.jumped && input.grounded {
            self.jump_hold_timer += input.dt;
            let window = if input.on_slope {
                tuning.slope_jump_hold_window
            } else {
                tuning.jump_hold_window
            };
            if self.jump_hold_timer >= window {
                self.jumped = false;
                self.jump_hold_timer = 0.0;
            }
        }

        let action = if input.submerged {
            if input.jump_held {
                JumpAction::Swim(tuning.jump_force * tuning.swim_force_multiplier)
            } else {
                JumpAction::None
            }
        } else if self.wants_to_jump && !self.jumped && self.can_jump(tuning.coyote_time) {
            self.wants_to_jump = false;
            self.jumped = true;
            self.jump_hold_timer = 0.0;
            // Close the coyote window so the jump can't be repeated mid-air.
            self.time_since_grounded = tuning.coyote_time;
            JumpAction::Jump(tuning.jump_force)
        } else {
            JumpAction::None
        };

        if !input.grounded {
            self.time_since_grounded += input.dt;
        }
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn pressed() -> InputEdges {
        InputEdges {
            jump_pressed: true,
            ..default()
        }
    }

    fn grounded(edges: InputEdges) -> JumpInput {
        JumpInput {
            edges,
            jump_held: edges.jump_pressed,
            grounded: true,
            dt: DT,
            ..default()
        }
    }

    fn airborne(edges: InputEdges) -> JumpInput {
        JumpInput {
            edges,
            jump_held: edges.jump_pressed,
            grounded: false,
            dt: DT,
            ..default()
        }
    }

    #[test]
    fn grounded_jump_fires_once() {
        let tuning = TuningParameters::default();
        let mut jump = JumpState::default();

        let action = jump.tick(grounded(pressed()), &tuning);
        assert_eq!(action, JumpAction::Jump(tuning.jump_force));
        assert!(jump.jumped);

        // Another press the very next tick, still on the ground.
        let action = jump.tick(grounded(pressed()), &tuning);
        assert_eq!(action, JumpAction::None);
        assert!(jump.jumped);
    }

    #[test]
    fn coyote_window_edges() {
        let tuning = TuningParameters::default();
        let eps = 1e-3;

        let mut inside = JumpState {
            time_since_grounded: tuning.coyote_time - eps,
            ..default()
        };
        assert_eq!(
            inside.tick(airborne(pressed()), &tuning),
            JumpAction::Jump(tuning.jump_force)
        );

        let mut outside = JumpState {
            time_since_grounded: tuning.coyote_time + eps,
            ..default()
        };
        assert_eq!(outside.tick(airborne(pressed()), &tuning), JumpAction::None);
    }

    #[test]
    fn leaving_a_ledge_keeps_jump_available_briefly() {
        let tuning = TuningParameters::default();
        let mut jump = JumpState::default();
        jump.tick(grounded(InputEdges::default()), &tuning);

        // 0.1s of falling is inside the 0.2s window.
        for _ in 0..6 {
            jump.tick(airborne(InputEdges::default()), &tuning);
        }
        assert!(jump.can_jump(tuning.coyote_time));
        assert!(matches!(jump.tick(airborne(pressed()), &tuning), JumpAction::Jump(_)));
    }

    #[test]
    fn no_double_jump_in_the_air() {
        let tuning = TuningParameters::default();
        let mut jump = JumpState::default();
        jump.tick(grounded(pressed()), &tuning);

        let release = InputEdges {
            jump_released: true,
            ..default()
        };
        jump.tick(airborne(release), &tuning);
        assert_eq!(jump.tick(airborne(pressed()), &tuning), JumpAction::None);
    }

    #[test]
    fn hold_window_clears_jumped_on_ground() {
        let tuning = TuningParameters::default();
        let mut jump = JumpState::default();
        jump.tick(grounded(pressed()), &tuning);

        let ticks = (tuning.jump_hold_window / DT).ceil() as usize + 1;
        for _ in 0..ticks {
            jump.tick(grounded(InputEdges::default()), &tuning);
        }
        assert!(!jump.jumped);
    }

    #[test]
    fn slope_hold_window_is_longer() {
        let tuning = TuningParameters::default();
        let mut jump = JumpState::default();
        let mut input = grounded(pressed());
        input.on_slope = true;
        jump.tick(input, &tuning);

        let mut held = grounded(InputEdges::default());
        held.on_slope = true;
        let flat_ticks = (tuning.jump_hold_window / DT).ceil() as usize + 1;
        for _ in 0..flat_ticks {
            jump.tick(held, &tuning);
        }
        assert!(jump.jumped, "slope window not yet elapsed");
    }

    #[test]
    fn release_clears_jumped_immediately() {
        let tuning = TuningParameters::default();
        let mut jump = JumpState::default();
        jump.tick(grounded(pressed()), &tuning);
        jump.tick(
            grounded(InputEdges {
                jump_released: true,
                ..default()
            }),
            &tuning,
        );
        assert!(!jump.jumped);
        assert!(!jump.wants_to_jump);
    }

    #[test]
    fn submerged_swims_instead_of_jumping() {
        let tuning = TuningParameters::default();
        let mut jump = JumpState::default();
        let mut input = grounded(pressed());
        input.submerged = true;
        let action = jump.tick(input, &tuning);
        assert_eq!(
            action,
            JumpAction::Swim(tuning.jump_force * tuning.swim_force_multiplier)
        );
        assert!(!jump.jumped);

        input.edges = InputEdges::default();
        input.jump_held = false;
        assert_eq!(jump.tick(input, &tuning), JumpAction::None);
    }

    #[test]
    fn buffered_press_fires_on_landing() {
        let tuning = TuningParameters::default();
        let mut jump = JumpState {
            time_since_grounded: 1.0,
            ..default()
        };
        assert_eq!(jump.tick(airborne(pressed()), &tuning), JumpAction::None);
        assert!(jump.wants_to_jump);
        assert!(matches!(
            jump.tick(grounded(InputEdges::default()), &tuning),
            JumpAction::Jump(_)
        ));
    }
}
