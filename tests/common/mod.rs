//! Scripted physics backend for end-to-end controller tests.
//!
//! `TestBackend` has no collision world. Sensor readings and contacts are
//! scripted per entity, and a tiny explicit-Euler solver integrates the
//! forces and impulses the controller writes, so every tick is exact.

#![allow(dead_code)]

use bevy::prelude::*;
use quake_motion_controller::backend::{BodyContact, ForceAccumulator};
use quake_motion_controller::collision::CollisionData;
use quake_motion_controller::prelude::*;

pub const DT: f32 = 1.0 / 60.0;

/// Rigid body state integrated by [`solver_step`].
#[derive(Component, Debug, Clone, Copy)]
pub struct TestBody {
    pub velocity: Vec3,
    pub mass: f32,
    /// Impulse waiting for the next solver step.
    pub impulse: Vec3,
    /// Every impulse ever applied, summed.
    pub total_impulse: Vec3,
    /// Force written by the controller for the next solver step.
    pub force: Vec3,
    pub gravity_scale: f32,
}

impl Default for TestBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            mass: 1.0,
            impulse: Vec3::ZERO,
            total_impulse: Vec3::ZERO,
            force: Vec3::ZERO,
            gravity_scale: 1.0,
        }
    }
}

/// Sensor readings copied into [`Sensors`] every tick.
#[derive(Component, Debug, Clone, Default)]
pub struct ScriptedSensors(pub Sensors);

/// Contacts reported by [`TestBackend::dynamic_contacts`].
#[derive(Component, Debug, Clone, Default)]
pub struct ScriptedContacts(pub Vec<BodyContact>);

/// Fixed timestep reported by the backend.
#[derive(Resource, Debug, Clone, Copy)]
pub struct TestTimestep(pub f32);

pub struct TestBackend;

impl MotionPhysicsBackend for TestBackend {
    fn plugin() -> impl Plugin {
        TestBackendPlugin
    }

    fn has_body(world: &World, entity: Entity) -> bool {
        world.get::<TestBody>(entity).is_some()
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<TestBody>(entity)
            .map(|b| b.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.impulse += impulse;
            body.total_impulse += impulse;
        }
    }

    fn set_gravity_scale(world: &mut World, entity: Entity, scale: f32) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.gravity_scale = scale;
        }
    }

    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<TestTimestep>()
            .map(|t| t.0)
            .unwrap_or(DT)
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world.get::<TestBody>(entity).map(|b| b.mass).unwrap_or(1.0)
    }

    fn dynamic_contacts(world: &World, entity: Entity) -> Vec<BodyContact> {
        world
            .get::<ScriptedContacts>(entity)
            .map(|c| c.0.clone())
            .unwrap_or_default()
    }
}

pub struct TestBackendPlugin;

impl Plugin for TestBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            clear_forces.in_set(MotionControllerSet::Preparation),
        );
        app.add_systems(
            FixedUpdate,
            copy_scripted_sensors.in_set(MotionControllerSet::Sensors),
        );
        app.add_systems(
            FixedUpdate,
            flush_forces.in_set(MotionControllerSet::FinalApplication),
        );
        app.add_systems(
            FixedPostUpdate,
            solver_step.before(MotionControllerSet::Reparent),
        );
    }
}

fn clear_forces(mut q: Query<(&mut TestBody, &mut ForceAccumulator)>) {
    for (mut body, mut accumulator) in &mut q {
        body.force -= accumulator.prepare_new_frame();
    }
}

fn copy_scripted_sensors(mut q: Query<(&ScriptedSensors, &mut Sensors)>) {
    for (scripted, mut sensors) in &mut q {
        *sensors = scripted.0.clone();
    }
}

fn flush_forces(mut q: Query<(&mut TestBody, &mut ForceAccumulator)>) {
    for (mut body, mut accumulator) in &mut q {
        body.force += accumulator.finalize_frame();
    }
}

/// Engine gravity, scaled per body by `gravity_scale`.
pub const ENGINE_GRAVITY: Vec3 = Vec3::new(0.0, -9.8, 0.0);

/// Explicit Euler step: impulses, then forces and engine gravity, then position.
fn solver_step(timestep: Option<Res<TestTimestep>>, mut q: Query<(&mut TestBody, &mut Transform)>) {
    let dt = timestep.map(|t| t.0).unwrap_or(DT);
    for (mut body, mut transform) in &mut q {
        let mass = body.mass;
        let impulse = std::mem::take(&mut body.impulse);
        let acceleration = body.force / mass + ENGINE_GRAVITY * body.gravity_scale;
        body.velocity += impulse / mass + acceleration * dt;
        transform.translation += body.velocity * dt;
    }
}

/// App with the controller plugin on the scripted backend.
pub fn create_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MotionControllerPlugin::<TestBackend>::default());
    app.insert_resource(TestTimestep(DT));
    app.finish();
    app.cleanup();
    app
}

/// Run one controller tick followed by the solver and re-parenting.
pub fn tick(app: &mut App) {
    app.world_mut().run_schedule(FixedUpdate);
    app.world_mut().run_schedule(FixedPostUpdate);
}

pub fn run_ticks(app: &mut App, ticks: usize) {
    for _ in 0..ticks {
        tick(app);
    }
}

/// Readings of an entity standing on flat ground.
pub fn on_flat_ground(surface: Option<Entity>) -> Sensors {
    let hit = CollisionData::new(0.9, Vec3::Y, Vec3::ZERO, surface);
    Sensors {
        ground: Some(hit),
        slope: Some(hit),
        resting_contact: surface,
        ..default()
    }
}

/// Readings of an entity on a slope of `degrees`, tilted around X.
pub fn on_slope(degrees: f32) -> Sensors {
    let normal = Quat::from_rotation_x(degrees.to_radians()) * Vec3::Y;
    let hit = CollisionData::new(0.9, normal, Vec3::ZERO, None);
    Sensors {
        ground: Some(hit),
        slope: Some(hit),
        ..default()
    }
}

/// Spawn a controlled entity with a unit-mass body.
pub fn spawn_controller(
    app: &mut App,
    position: Vec3,
    tuning: TuningParameters,
    sensors: Sensors,
) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(position),
            MotionController,
            tuning,
            TestBody::default(),
            ScriptedSensors(sensors),
        ))
        .id()
}

pub fn set_sensors(app: &mut App, entity: Entity, sensors: Sensors) {
    if let Some(mut scripted) = app.world_mut().get_mut::<ScriptedSensors>(entity) {
        scripted.0 = sensors;
    }
}

pub fn intent(app: &mut App, entity: Entity) -> Mut<'_, MovementIntent> {
    app.world_mut()
        .get_mut::<MovementIntent>(entity)
        .expect("entity has a MovementIntent")
}

pub fn body(app: &App, entity: Entity) -> TestBody {
    *app.world().get::<TestBody>(entity).expect("entity has a TestBody")
}

pub fn world_position(app: &App, entity: Entity) -> Vec3 {
    TestBackend::get_position(app.world(), entity)
}
