//! Query and command surface of a controlled entity.
//!
//! Thin collaborators (audio, save/load, scripted zones, debug tools) go
//! through [`MotionBody`] instead of poking at the controller's components.

use std::marker::PhantomData;

use bevy::prelude::*;

use crate::backend::MotionPhysicsBackend;
use crate::config::{ExternalForceConfig, TuningBaseline, TuningParameters};
use crate::crouch::CrouchState;
use crate::detection::{Sensors, SurfaceMetadata, SurfaceTag};
use crate::external::ExternalForces;
use crate::modifiers::PhysicsModifiers;
use crate::snapshot::PhysicsSnapshot;
use crate::state::MotionState;
use crate::MotionController;

/// Handle to one controlled entity.
///
/// # Example
///
/// ```rust,ignore
/// fn slow_zone(world: &mut World) {
///     if let Some(mut body) = MotionBody::<Rapier3dBackend>::new(world, player) {
///         body.set_speed_multiplier(0.5);
///     }
/// }
/// ```
pub struct MotionBody<'w, B: MotionPhysicsBackend> {
    world: &'w mut World,
    entity: Entity,
    _backend: PhantomData<B>,
}

impl<'w, B: MotionPhysicsBackend> MotionBody<'w, B> {
    /// Returns `None` if `entity` is not a motion controller.
    pub fn new(world: &'w mut World, entity: Entity) -> Option<Self> {
        world.get::<MotionController>(entity)?;
        Some(Self {
            world,
            entity,
            _backend: PhantomData,
        })
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    fn state(&self) -> MotionState {
        self.world
            .get::<MotionState>(self.entity)
            .copied()
            .unwrap_or_default()
    }

    // === Queries ===

    pub fn is_grounded(&self) -> bool {
        self.state().grounded
    }

    pub fn is_in_water(&self) -> bool {
        self.state().in_water
    }

    pub fn is_on_slope(&self) -> bool {
        self.state().on_slope
    }

    pub fn velocity(&self) -> Vec3 {
        B::get_velocity(self.world, self.entity)
    }

    /// Metadata value of the surface under the ground probe.
    pub fn ground_surface_metadata(&self, key: &str) -> Option<String> {
        let ground = self.world.get::<Sensors>(self.entity)?.ground_entity()?;
        self.world
            .get::<SurfaceMetadata>(ground)?
            .get(key)
            .map(str::to_owned)
    }

    /// Sound tag of the surface under the ground probe.
    pub fn ground_surface_tag(&self) -> SurfaceTag {
        self.world
            .get::<Sensors>(self.entity)
            .and_then(Sensors::ground_entity)
            .and_then(|ground| self.world.get::<SurfaceMetadata>(ground))
            .map(SurfaceMetadata::tag)
            .unwrap_or_default()
    }

    // === Body commands ===

    pub fn set_velocity(&mut self, velocity: Vec3) {
        B::set_velocity(self.world, self.entity, velocity);
    }

    pub fn apply_force(&mut self, force: Vec3) {
        B::apply_force(self.world, self.entity, force);
    }

    pub fn apply_impulse(&mut self, impulse: Vec3) {
        B::apply_impulse(self.world, self.entity, impulse);
    }

    /// Move to `position` and stop.
    pub fn teleport(&mut self, position: Vec3) {
        B::set_position(self.world, self.entity, position);
        B::set_velocity(self.world, self.entity, Vec3::ZERO);
        if let Some(mut state) = self.world.get_mut::<MotionState>(self.entity) {
            state.linear_velocity = Vec3::ZERO;
        }
    }

    // === Modifiers ===

    fn modifiers(&mut self) -> Option<Mut<'_, PhysicsModifiers>> {
        self.world.get_mut::<PhysicsModifiers>(self.entity)
    }

    pub fn set_drag_multiplier(&mut self, multiplier: f32) {
        if let Some(mut m) = self.modifiers() {
            m.set_drag_multiplier(multiplier);
        }
    }

    pub fn set_speed_multiplier(&mut self, multiplier: f32) {
        if let Some(mut m) = self.modifiers() {
            m.set_speed_multiplier(multiplier);
        }
    }

    pub fn set_acceleration_multiplier(&mut self, multiplier: f32) {
        if let Some(mut m) = self.modifiers() {
            m.set_acceleration_multiplier(multiplier);
        }
    }

    pub fn set_gravity_multiplier(&mut self, multiplier: f32) {
        if let Some(mut m) = self.modifiers() {
            m.set_gravity_multiplier(multiplier);
        }
    }

    pub fn set_drag_override(&mut self, drag: Option<f32>) {
        if let Some(mut m) = self.modifiers() {
            m.set_drag_override(drag);
        }
    }

    pub fn set_speed_override(&mut self, speed: Option<f32>) {
        if let Some(mut m) = self.modifiers() {
            m.set_speed_override(speed);
        }
    }

    pub fn clear_all_modifiers(&mut self) {
        if let Some(mut m) = self.modifiers() {
            m.clear_all();
        }
    }

    /// Restore every tunable to its authored value.
    pub fn reset_to_baseline(&mut self) {
        let Some(baseline) = self.world.get::<TuningBaseline>(self.entity).copied() else {
            return;
        };
        if let Some(mut tuning) = self.world.get_mut::<TuningParameters>(self.entity) {
            baseline.reset(&mut tuning);
        }
    }

    // === External forces ===

    fn external_config(&self) -> ExternalForceConfig {
        self.world
            .get::<ExternalForceConfig>(self.entity)
            .copied()
            .unwrap_or_default()
    }

    pub fn apply_external_force(&mut self, force: Vec3, duration: f32, source: &str) {
        let config = self.external_config();
        if let Some(mut forces) = self.world.get_mut::<ExternalForces>(self.entity) {
            forces.apply_force(force, duration, source, &config);
        }
    }

    pub fn apply_external_impulse(&mut self, force: Vec3, source: &str) {
        let config = self.external_config();
        if let Some(mut forces) = self.world.get_mut::<ExternalForces>(self.entity) {
            forces.apply_impulse(force, source, &config);
        }
    }

    pub fn clear_external_forces(&mut self) {
        if let Some(mut forces) = self.world.get_mut::<ExternalForces>(self.entity) {
            forces.clear();
        }
    }

    // === Persistence ===

    pub fn snapshot(&self) -> PhysicsSnapshot {
        let tuning = self
            .world
            .get::<TuningParameters>(self.entity)
            .copied()
            .unwrap_or_default();
        let forces = self.world.get::<ExternalForces>(self.entity);
        // Crouching lowers the live cap; save the one standing up restores.
        let crouching = self
            .world
            .get::<CrouchState>(self.entity)
            .is_some_and(|crouch| crouch.is_crouching);
        let walk_speed = match self.world.get::<TuningBaseline>(self.entity) {
            Some(baseline) if crouching => baseline.get().max_ground_speed,
            _ => tuning.max_ground_speed,
        };
        PhysicsSnapshot {
            position: B::get_position(self.world, self.entity),
            velocity: self.velocity(),
            ground_drag: tuning.ground_drag,
            water_drag: tuning.water_drag,
            jump_force: tuning.jump_force,
            walk_speed,
            water_speed: tuning.max_water_speed,
            external_velocity: forces.map(ExternalForces::external_velocity).unwrap_or_default(),
            last_impact_magnitude: forces.map(ExternalForces::last_impact_magnitude).unwrap_or_default(),
        }
    }

    pub fn restore(&mut self, snapshot: &PhysicsSnapshot) {
        B::set_position(self.world, self.entity, snapshot.position);
        B::set_velocity(self.world, self.entity, snapshot.velocity);

        if let Some(mut tuning) = self.world.get_mut::<TuningParameters>(self.entity) {
            tuning.ground_drag = snapshot.ground_drag;
            tuning.water_drag = snapshot.water_drag;
            tuning.jump_force = snapshot.jump_force;
            tuning.max_ground_speed = snapshot.walk_speed;
            tuning.max_water_speed = snapshot.water_speed;
        }

        if let Some(mut forces) = self.world.get_mut::<ExternalForces>(self.entity) {
            forces.restore(snapshot.external_velocity, snapshot.last_impact_magnitude);
        }
        debug!("{}: restored from snapshot", self.entity);
    }
}
