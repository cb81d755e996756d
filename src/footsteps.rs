//! Footstep cues for the audio layer.
//!
//! The controller only decides *when* a step or landing sound should play and
//! on which surface. Picking the clip, randomizing pitch and playing it is up
//! to the game.

use bevy::prelude::*;

use crate::detection::SurfaceTag;

/// Minimum speed for walking steps.
pub const STEP_SPEED_THRESHOLD: f32 = 0.5;

#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootstepKind {
    Step,
    Landing,
}

/// A request to play one footstep sound.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct FootstepCue {
    pub kind: FootstepKind,
    pub surface: SurfaceTag,
    pub speed: f32,
    /// Base pitch; the audio layer adds its own jitter.
    pub pitch: f32,
}

/// Footstep timing for one entity. `cue` holds this tick's request, if any.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct FootstepState {
    /// Seconds between walking steps (length of the step sound).
    pub step_interval: f32,
    pub cooldown: f32,
    pub cue: Option<FootstepCue>,
}

impl Default for FootstepState {
    fn default() -> Self {
        Self {
            step_interval: 0.35,
            cooldown: 0.0,
            cue: None,
        }
    }
}

/// Inputs of one footstep tick.
#[derive(Debug, Clone, Copy)]
pub struct FootstepInput {
    pub grounded: bool,
    pub grounded_changed: bool,
    pub jumped: bool,
    pub speed: f32,
    pub surface: SurfaceTag,
    pub dt: f32,
}

impl FootstepState {
    /// Advance one tick and return this tick's cue.
    pub fn tick(&mut self, input: FootstepInput) -> Option<FootstepCue> {
        self.cooldown = (self.cooldown - input.dt).max(0.0);
        self.cue = None;
        if !input.grounded {
            return None;
        }

        let kind = if input.grounded_changed && input.jumped {
            FootstepKind::Landing
        } else if input.speed > STEP_SPEED_THRESHOLD && self.cooldown <= 0.0 {
            FootstepKind::Step
        } else {
            return None;
        };

        let pitch = match kind {
            FootstepKind::Step => 1.0 + input.speed * 0.1,
            FootstepKind::Landing => 1.0 + input.speed * 0.01,
        };
        self.cooldown = self.step_interval;
        self.cue = Some(FootstepCue {
            kind,
            surface: input.surface,
            speed: input.speed,
            pitch,
        });
        self.cue
    }
}
