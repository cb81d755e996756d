//! Physics backend abstraction.
//!
//! The controller never talks to a physics engine directly. Everything it
//! needs from the rigid body (velocity, forces, impulses, gravity scale,
//! mass, contacts) goes through [`MotionPhysicsBackend`], so engines can be
//! swapped without touching the movement code.

use bevy::prelude::*;

use crate::platform::compose_world_transform;

/// A contact between the controlled body and another dynamic body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyContact {
    pub other: Entity,
    /// Separation axis, pointing from the other body toward this one.
    pub separation: Vec3,
    /// Other body's velocity minus this body's velocity.
    pub relative_velocity: Vec3,
}

/// Trait for physics backend implementations.
///
/// All methods are static and operate on the [`World`], so controller
/// systems can stay generic over the backend.
///
/// Forces go through [`ForceAccumulator`]: backends add to it in
/// [`apply_force`](Self::apply_force) and write the sum to the engine once
/// per tick, after subtracting what they wrote the tick before.
pub trait MotionPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Whether the entity has a body this backend can drive.
    fn has_body(world: &World, entity: Entity) -> bool;

    /// Get the current linear velocity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the linear velocity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Apply a continuous force for the current tick.
    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        if let Some(mut accumulator) = world.get_mut::<ForceAccumulator>(entity) {
            accumulator.add(force);
        }
    }

    /// Apply an instantaneous change in momentum.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3);

    /// Override the engine's gravity scale for the body.
    fn set_gravity_scale(world: &mut World, entity: Entity, scale: f32);

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }

    /// Get the mass of an entity.
    ///
    /// Used to turn velocity changes into forces.
    fn get_mass(_world: &World, _entity: Entity) -> f32 {
        1.0
    }

    /// Contacts with other dynamic bodies this tick.
    fn dynamic_contacts(_world: &World, _entity: Entity) -> Vec<BodyContact> {
        Vec::new()
    }

    /// World position of the body.
    fn get_position(world: &World, entity: Entity) -> Vec3 {
        compose_world_transform(world, entity)
            .map(|t| t.translation())
            .unwrap_or(Vec3::ZERO)
    }

    /// Move the body to a world position.
    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        let parent_global = world
            .get::<ChildOf>(entity)
            .and_then(|child_of| compose_world_transform(world, child_of.parent()));
        let local = match parent_global {
            Some(parent) => parent.affine().inverse().transform_point3(position),
            None => position,
        };
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = local;
        }
    }

    /// World orientation of the body (source of its basis vectors).
    fn get_orientation(world: &World, entity: Entity) -> Quat {
        compose_world_transform(world, entity)
            .map(|t| t.rotation())
            .unwrap_or(Quat::IDENTITY)
    }

    /// Vertical scale of the body and its collision shape.
    fn get_body_height_scale(world: &World, entity: Entity) -> f32 {
        world
            .get::<Transform>(entity)
            .map(|t| t.scale.y)
            .unwrap_or(1.0)
    }

    /// Set the vertical scale of the body and its collision shape.
    fn set_body_height_scale(world: &mut World, entity: Entity, scale_y: f32) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.scale.y = scale_y;
        }
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}

/// Controller forces for the current tick.
///
/// Forces accumulate in `pending` during the tick. At the end of the tick the
/// backend writes them to the engine and remembers them in `applied`, so the
/// next tick can remove exactly what the controller added and leave any user
/// forces on the body untouched.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct ForceAccumulator {
    pending: Vec3,
    applied: Vec3,
}

impl ForceAccumulator {
    pub fn add(&mut self, force: Vec3) {
        if force.is_finite() {
            self.pending += force;
        }
    }

    /// Force accumulated so far this tick.
    pub fn pending(&self) -> Vec3 {
        self.pending
    }

    /// Start a new tick. Returns the force written last tick, to subtract.
    pub fn prepare_new_frame(&mut self) -> Vec3 {
        self.pending = Vec3::ZERO;
        std::mem::take(&mut self.applied)
    }

    /// End the tick. Returns the force to write to the engine.
    pub fn finalize_frame(&mut self) -> Vec3 {
        self.applied = self.pending;
        self.pending
    }
}
