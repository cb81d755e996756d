//! Flat physics snapshot for save/load.
//!
//! The controller produces and consumes this record; writing it to disk is
//! the caller's business.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicsSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub ground_drag: f32,
    pub water_drag: f32,
    pub jump_force: f32,
    pub walk_speed: f32,
    pub water_speed: f32,
    pub external_velocity: Vec3,
    pub last_impact_magnitude: f32,
}
