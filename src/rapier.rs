//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::parry::shape::Ball;
use bevy_rapier3d::prelude::*;

use crate::backend::{BodyContact, ForceAccumulator, MotionPhysicsBackend};
use crate::collision::CollisionData;
use crate::config::{MotionGravity, ProbeConfig};
use crate::detection::{Sensors, WaterVolume};
use crate::error::ControllerDisabled;
use crate::MotionController;

/// Rapier3D physics backend for the motion controller.
///
/// Body operations go through `bevy_rapier3d` components. The environment
/// probes are dedicated Rapier systems that receive the Rapier context as a
/// system parameter.
pub struct Rapier3dBackend;

impl MotionPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn has_body(world: &World, entity: Entity) -> bool {
        world.get::<RigidBody>(entity).is_some() && world.get::<Velocity>(entity).is_some()
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
        } else if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            // No ExternalImpulse: apply as a velocity change for unit mass
            vel.linvel += impulse;
        }
    }

    fn set_gravity_scale(world: &mut World, entity: Entity, scale: f32) {
        if let Some(mut gravity_scale) = world.get_mut::<GravityScale>(entity) {
            gravity_scale.0 = scale;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(GravityScale(scale));
        }
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.mass)
            .filter(|mass| *mass > 0.0 && mass.is_finite())
            .unwrap_or(1.0)
    }

    fn dynamic_contacts(world: &World, entity: Entity) -> Vec<BodyContact> {
        let Some(colliding) = world.get::<CollidingEntities>(entity) else {
            return Vec::new();
        };
        let position = Self::get_position(world, entity);
        let velocity = Self::get_velocity(world, entity);

        colliding
            .iter()
            .filter(|&other| other != entity)
            .filter(|&other| matches!(world.get::<RigidBody>(other), Some(RigidBody::Dynamic)))
            .filter_map(|other| {
                let other_velocity = world.get::<Velocity>(other)?.linvel;
                Some(BodyContact {
                    other,
                    separation: position - Self::get_position(world, other),
                    relative_velocity: other_velocity - velocity,
                })
            })
            .collect()
    }
}

/// Plugin that sets up Rapier3D-specific systems for the motion controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        use crate::MotionControllerSet;

        // Remove last tick's controller forces before anything adds new ones
        app.add_systems(
            FixedUpdate,
            clear_controller_forces.in_set(MotionControllerSet::Preparation),
        );

        app.add_systems(
            FixedUpdate,
            rapier_probe_sensors.in_set(MotionControllerSet::Sensors),
        );

        // Write the accumulated forces for the physics step
        app.add_systems(
            FixedUpdate,
            apply_controller_forces.in_set(MotionControllerSet::FinalApplication),
        );
    }
}

fn probe_filter(entity: Entity, collision_groups: Option<&CollisionGroups>) -> QueryFilter<'static> {
    let mut filter = QueryFilter::default()
        .exclude_rigid_body(entity)
        .exclude_sensors();
    if let Some(groups) = collision_groups {
        filter = filter.groups(*groups);
    }
    filter
}

/// Cast a sphere from `origin` along `direction`.
fn rapier_sphere_cast(
    context: &RapierContext,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    radius: f32,
    filter: QueryFilter,
) -> Option<CollisionData> {
    let shape = Ball::new(radius);
    context
        .cast_shape(
            origin,
            Quat::IDENTITY,
            direction,
            &shape,
            ShapeCastOptions {
                max_time_of_impact: max_distance,
                stop_at_penetration: false,
                ..default()
            },
            filter,
        )
        .map(|(hit_entity, hit)| {
            let normal = hit.details.map(|d| d.normal1).unwrap_or(-direction);
            let hit_point = origin + direction * hit.time_of_impact;
            CollisionData::new(hit.time_of_impact, normal, hit_point, Some(hit_entity))
        })
}

/// Refresh [`Sensors`] from Rapier scene queries.
///
/// Every probe is oriented by gravity, not by the body's rotation:
/// - ground: ray straight down, reports the hit entity
/// - slope: ray straight down, reports the surface normal
/// - resting contact: sphere cast down, reports the surface for attachment
/// - ceiling: sphere cast up, blocks uncrouching
/// - submersion: sphere overlap against [`WaterVolume`] colliders
fn rapier_probe_sensors(
    rapier_context: ReadRapierContext,
    gravity: Res<MotionGravity>,
    water_volumes: Query<(), With<WaterVolume>>,
    mut q_controllers: Query<
        (
            Entity,
            &GlobalTransform,
            &ProbeConfig,
            &mut Sensors,
            Option<&CollisionGroups>,
        ),
        (With<MotionController>, Without<ControllerDisabled>),
    >,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    let up = gravity.up();
    let down = -up;

    for (entity, transform, probes, mut sensors, collision_groups) in &mut q_controllers {
        let position = transform.translation();
        let filter = probe_filter(entity, collision_groups);

        sensors.clear();

        if let Some(length) = probes.ground_probe {
            sensors.ground = context
                .cast_ray(position, down, length, true, filter)
                .map(|(hit_entity, toi)| {
                    // A plain ray has no normal; the slope probe supplies it
                    CollisionData::new(toi, up, position + down * toi, Some(hit_entity))
                });
        }

        if let Some(length) = probes.slope_probe {
            sensors.slope = context
                .cast_ray_and_get_normal(position, down, length, true, filter)
                .map(|(hit_entity, hit)| {
                    CollisionData::new(hit.time_of_impact, hit.normal, hit.point, Some(hit_entity))
                });
        }

        if let Some(length) = probes.resting_probe {
            sensors.resting_contact =
                rapier_sphere_cast(&context, position, down, length, probes.probe_radius, filter)
                    .and_then(|hit| hit.entity);
        }

        if let Some(length) = probes.ceiling_probe {
            sensors.ceiling =
                rapier_sphere_cast(&context, position, up, length, probes.probe_radius, filter);
        }

        if let Some(radius) = probes.water_probe_radius {
            // Water volumes are usually sensors, so they stay in the filter
            let mut water_filter = QueryFilter::default().exclude_rigid_body(entity);
            if let Some(groups) = collision_groups {
                water_filter = water_filter.groups(*groups);
            }
            let shape = Ball::new(radius);
            let mut submerged = false;
            context.intersect_shape(
                position,
                Quat::IDENTITY,
                &shape,
                water_filter,
                |hit_entity| {
                    submerged = water_volumes.contains(hit_entity);
                    !submerged
                },
            );
            sensors.submerged = submerged;
        }
    }
}

/// Remove last tick's controller forces from `ExternalForce`.
///
/// Runs before any controller force system, so forces added by other code
/// survive while the controller's own contribution never stacks up.
pub fn clear_controller_forces(mut q: Query<(&mut ExternalForce, &mut ForceAccumulator)>) {
    for (mut ext_force, mut accumulator) in &mut q {
        ext_force.force -= accumulator.prepare_new_frame();
    }
}

/// Write this tick's accumulated controller forces to `ExternalForce`.
pub fn apply_controller_forces(mut q: Query<(&mut ExternalForce, &mut ForceAccumulator)>) {
    for (mut ext_force, mut accumulator) in &mut q {
        ext_force.force += accumulator.finalize_frame();
    }
}

/// Bundle for creating a motion-controlled body with Rapier3D physics.
///
/// Provides the Rapier components the backend reads and writes. Add a
/// collider separately.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use quake_motion_controller::prelude::*;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 2.0, 0.0),
///         MotionController,
///         TuningParameters::player(),
///         RapierMotionBundle::new(),
///         Collider::capsule_y(0.5, 0.4),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED`], the body stays upright
/// - `gravity_scale`: zero, gravity is integrated by the controller
/// - `ccd`: enabled, fast falls don't tunnel through thin floors
/// - `active_events`: collision events, so impacts show up in
///   [`CollidingEntities`]
#[derive(Bundle)]
pub struct RapierMotionBundle {
    pub rigid_body: RigidBody,
    pub velocity: Velocity,
    /// Controller forces are written here once per tick.
    pub external_force: ExternalForce,
    /// Jump impulses.
    pub external_impulse: ExternalImpulse,
    pub locked_axes: LockedAxes,
    pub gravity_scale: GravityScale,
    pub ccd: Ccd,
    pub mass_properties: ReadMassProperties,
    pub active_events: ActiveEvents,
    pub colliding_entities: CollidingEntities,
}

impl Default for RapierMotionBundle {
    fn default() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::zero(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            gravity_scale: GravityScale(0.0),
            ccd: Ccd::enabled(),
            mass_properties: ReadMassProperties::default(),
            active_events: ActiveEvents::COLLISION_EVENTS,
            colliding_entities: CollidingEntities::default(),
        }
    }
}

impl RapierMotionBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different rigid body type.
    ///
    /// Anything but [`RigidBody::Dynamic`] ignores the controller forces.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }

    pub fn with_velocity(mut self, linvel: Vec3) -> Self {
        self.velocity = Velocity::linear(linvel);
        self
    }
}

#[cfg(test)]
mod tests {
    use bevy::ecs::system::RunSystemOnce;

    use super::*;

    fn spawn_body(world: &mut World, position: Vec3, velocity: Vec3) -> Entity {
        world
            .spawn((
                Transform::from_translation(position),
                RapierMotionBundle::new().with_velocity(velocity),
            ))
            .id()
    }

    #[test]
    fn rapier_backend_position_and_velocity() {
        let mut world = World::new();
        let entity = spawn_body(&mut world, Vec3::new(1.0, 2.0, 3.0), Vec3::new(5.0, 0.0, 3.0));

        let pos = Rapier3dBackend::get_position(&world, entity);
        assert!((pos - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-4);

        let vel = Rapier3dBackend::get_velocity(&world, entity);
        assert!((vel - Vec3::new(5.0, 0.0, 3.0)).length() < 1e-4);

        Rapier3dBackend::set_velocity(&mut world, entity, Vec3::X * 10.0);
        assert_eq!(Rapier3dBackend::get_velocity(&world, entity), Vec3::X * 10.0);
    }

    #[test]
    fn rapier_backend_requires_body() {
        let mut world = World::new();
        let body = spawn_body(&mut world, Vec3::ZERO, Vec3::ZERO);
        let bare = world.spawn(Transform::default()).id();

        assert!(Rapier3dBackend::has_body(&world, body));
        assert!(!Rapier3dBackend::has_body(&world, bare));
    }

    #[test]
    fn impulses_go_to_external_impulse() {
        let mut world = World::new();
        let entity = spawn_body(&mut world, Vec3::ZERO, Vec3::ZERO);

        Rapier3dBackend::apply_impulse(&mut world, entity, Vec3::Y * 4.0);
        Rapier3dBackend::apply_impulse(&mut world, entity, Vec3::Y * 1.0);

        let impulse = world.get::<ExternalImpulse>(entity).unwrap().impulse;
        assert_eq!(impulse, Vec3::Y * 5.0);
        assert_eq!(Rapier3dBackend::get_velocity(&world, entity), Vec3::ZERO);
    }

    #[test]
    fn gravity_scale_is_inserted_when_missing() {
        let mut world = World::new();
        let entity = world
            .spawn((Transform::default(), RigidBody::Dynamic, Velocity::zero()))
            .id();

        Rapier3dBackend::set_gravity_scale(&mut world, entity, 0.0);
        assert_eq!(world.get::<GravityScale>(entity).unwrap().0, 0.0);
    }

    #[test]
    fn mass_falls_back_to_one_before_first_step() {
        let mut world = World::new();
        let entity = spawn_body(&mut world, Vec3::ZERO, Vec3::ZERO);
        assert_eq!(Rapier3dBackend::get_mass(&world, entity), 1.0);
    }

    #[test]
    fn controller_forces_do_not_stack() {
        let mut world = World::new();
        let entity = world
            .spawn((
                ExternalForce {
                    force: Vec3::Z * 2.0,
                    ..default()
                },
                ForceAccumulator::default(),
            ))
            .id();

        for _ in 0..3 {
            world.run_system_once(clear_controller_forces).unwrap();
            world
                .get_mut::<ForceAccumulator>(entity)
                .unwrap()
                .add(Vec3::X * 10.0);
            world.run_system_once(apply_controller_forces).unwrap();
        }

        // User force preserved, controller force applied once
        let force = world.get::<ExternalForce>(entity).unwrap().force;
        assert!((force - Vec3::new(10.0, 0.0, 2.0)).length() < 1e-5);
    }
}
