//! Per-variant affordances.
//!
//! Players, AI and items share the same physics core. What differs is
//! layered on as small components whose systems only use the public
//! [`MotionBody`] surface.

use bevy::prelude::*;

use crate::backend::MotionPhysicsBackend;
use crate::body::MotionBody;
use crate::error::ControllerDisabled;

/// An item: no drive, no jump, no crouch. Friction, gravity and external
/// forces still apply.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct InertBody;

/// Debug teleport to a fixed destination.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct DebugTeleport {
    pub destination: Vec3,
    requested: bool,
}

impl DebugTeleport {
    pub fn new(destination: Vec3) -> Self {
        Self {
            destination,
            requested: false,
        }
    }

    /// Teleport at the start of the next tick.
    pub fn request(&mut self) {
        self.requested = true;
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }
}

/// Respawn the entity when it falls below `min_height`.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct KillPlane {
    pub min_height: f32,
    pub respawn: Vec3,
}

impl Default for KillPlane {
    fn default() -> Self {
        Self {
            min_height: -64.0,
            respawn: Vec3::ZERO,
        }
    }
}

impl KillPlane {
    pub fn new(respawn: Vec3) -> Self {
        Self {
            respawn,
            ..default()
        }
    }

    pub fn with_min_height(mut self, min_height: f32) -> Self {
        self.min_height = min_height;
        self
    }
}

/// Execute pending debug teleports.
pub fn apply_debug_teleports<B: MotionPhysicsBackend>(world: &mut World) {
    let requests: Vec<(Entity, Vec3)> = world
        .query_filtered::<(Entity, &DebugTeleport), Without<ControllerDisabled>>()
        .iter(world)
        .filter(|(_, teleport)| teleport.requested)
        .map(|(entity, teleport)| (entity, teleport.destination))
        .collect();

    for (entity, destination) in requests {
        if let Some(mut teleport) = world.get_mut::<DebugTeleport>(entity) {
            teleport.requested = false;
        }
        if let Some(mut body) = MotionBody::<B>::new(world, entity) {
            body.teleport(destination);
            debug!("{entity}: debug teleport to {destination}");
        }
    }
}

/// Respawn entities that fell through the world.
pub fn apply_kill_planes<B: MotionPhysicsBackend>(world: &mut World) {
    let planes: Vec<(Entity, KillPlane)> = world
        .query_filtered::<(Entity, &KillPlane), Without<ControllerDisabled>>()
        .iter(world)
        .map(|(entity, plane)| (entity, *plane))
        .collect();

    for (entity, plane) in planes {
        if B::get_position(world, entity).y >= plane.min_height {
            continue;
        }
        let respawn = plane.respawn;
        if let Some(mut body) = MotionBody::<B>::new(world, entity) {
            body.clear_external_forces();
            body.teleport(respawn);
            info!("{entity}: fell below kill plane, respawned at {respawn}");
        }
    }
}
