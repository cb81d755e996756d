//! Core controller systems.
//!
//! These systems run the per-tick pipeline: initialization, state update,
//! intent, integration, external forces, jump/crouch, attachment and
//! footsteps. They are generic over the physics backend so the movement code
//! never depends on a particular engine.

use bevy::prelude::*;

use crate::backend::MotionPhysicsBackend;
use crate::config::{
    ExternalForceConfig, MotionGravity, ProbeConfig, TuningBaseline, TuningParameters,
    MAX_TICK_SECONDS,
};
use crate::crouch::{CrouchInput, CrouchState};
use crate::detection::{Sensors, SurfaceMetadata};
use crate::error::{ControllerDisabled, ControllerError};
use crate::external::{impact_impulse, ExternalForces, IMPACT_SOURCE};
use crate::footsteps::{FootstepInput, FootstepState};
use crate::integrator::{velocity_change_force, IntegrationStep, RegimeParams};
use crate::intent::MovementIntent;
use crate::jump::{JumpAction, JumpInput, JumpState};
use crate::modifiers::PhysicsModifiers;
use crate::platform::{MovingPlatform, PlatformAttachment};
use crate::state::{Airborne, Grounded, MotionState, Regime, Submerged};
use crate::variants::InertBody;
use crate::MotionController;

/// Filter for controllers that passed initialization.
type Active = (With<MotionController>, Without<ControllerDisabled>);

/// Tick length clamped to `[0, MAX_TICK_SECONDS]`.
pub fn tick_seconds<B: MotionPhysicsBackend>(world: &World) -> f32 {
    let dt = B::get_fixed_timestep(world);
    if dt.is_finite() {
        dt.clamp(0.0, MAX_TICK_SECONDS)
    } else {
        0.0
    }
}

fn gravity(world: &World) -> MotionGravity {
    world
        .get_resource::<MotionGravity>()
        .copied()
        .unwrap_or_default()
}

/// Check that a controller has everything it needs to run.
pub fn validate_controller<B: MotionPhysicsBackend>(
    world: &World,
    entity: Entity,
    tuning: &TuningParameters,
    probes: &ProbeConfig,
) -> Result<(), ControllerError> {
    if !B::has_body(world, entity) {
        return Err(ControllerError::MissingBody(entity));
    }
    if !matches!(probes.ground_probe, Some(length) if length > 0.0) {
        return Err(ControllerError::MissingGroundProbe(entity));
    }
    tuning.validate()
}

/// Validate and initialize controllers seen for the first time.
///
/// Captures the tuning baseline, the standing body scale and the initial
/// parent, and hands gravity over to the integrator. A controller that fails
/// validation is logged once and disabled.
pub fn initialize_controllers<B: MotionPhysicsBackend>(world: &mut World) {
    let pending: Vec<(Entity, TuningParameters, ProbeConfig)> = world
        .query_filtered::<(Entity, &TuningParameters, &ProbeConfig), (
            With<MotionController>,
            Without<TuningBaseline>,
            Without<ControllerDisabled>,
        )>()
        .iter(world)
        .map(|(entity, tuning, probes)| (entity, *tuning, *probes))
        .collect();

    for (entity, tuning, probes) in pending {
        if let Err(err) = validate_controller::<B>(world, entity, &tuning, &probes) {
            error!("{entity}: motion controller disabled: {err}");
            world.entity_mut(entity).insert(ControllerDisabled(err));
            continue;
        }

        let scale_y = B::get_body_height_scale(world, entity);
        let parent = world.get::<ChildOf>(entity).map(ChildOf::parent);
        B::set_gravity_scale(world, entity, 0.0);
        world.entity_mut(entity).insert((
            TuningBaseline::capture(&tuning),
            CrouchState::new(scale_y),
            PlatformAttachment::new(parent),
        ));
        debug!("{entity}: motion controller initialized");
    }
}

/// Derive flags and regime from this tick's sensor readings.
pub fn update_motion_state(
    gravity: Res<MotionGravity>,
    mut q: Query<(&Sensors, &TuningParameters, &mut MotionState), Active>,
) {
    let up = gravity.up();
    for (sensors, tuning, mut state) in &mut q {
        state.refresh(sensors, up, tuning.max_slope_angle_degrees);
    }
}

/// Mirror the active regime into marker components.
pub fn sync_state_markers(
    mut commands: Commands,
    q: Query<(Entity, &MotionState, Has<Grounded>, Has<Airborne>, Has<Submerged>), Active>,
) {
    for (entity, state, grounded, airborne, submerged) in &q {
        let mut entity_commands = commands.entity(entity);
        set_marker::<Grounded>(&mut entity_commands, state.regime == Regime::Ground, grounded);
        set_marker::<Airborne>(&mut entity_commands, state.regime == Regime::Air, airborne);
        set_marker::<Submerged>(&mut entity_commands, state.regime == Regime::Water, submerged);
    }
}

fn set_marker<M: Component + Default>(entity: &mut EntityCommands, wanted: bool, present: bool) {
    if wanted && !present {
        entity.insert(M::default());
    } else if !wanted && present {
        entity.remove::<M>();
    }
}

/// Latch this tick's jump/crouch edges from the held states.
pub fn latch_intent_edges(mut q: Query<&mut MovementIntent, Active>) {
    for mut intent in &mut q {
        intent.latch_edges();
    }
}

/// Turn the movement intent into a world-space wish direction.
pub fn compute_wish_direction<B: MotionPhysicsBackend>(world: &mut World) {
    let up = gravity(world).up();
    let entities: Vec<(Entity, MovementIntent, bool)> = world
        .query_filtered::<(Entity, &MovementIntent, Has<InertBody>), Active>()
        .iter(world)
        .map(|(entity, intent, inert)| (entity, intent.clone(), inert))
        .collect();

    for (entity, intent, inert) in entities {
        let wish = if inert {
            Vec3::ZERO
        } else {
            intent.wish_direction(B::get_orientation(world, entity), up)
        };
        if let Some(mut state) = world.get_mut::<MotionState>(entity) {
            state.wish_direction = wish;
        }
    }
}

/// Run the regime math and store the controller's target velocity.
///
/// Last tick's external contribution is removed from the body velocity
/// first, so it is never integrated twice.
pub fn integrate_velocity<B: MotionPhysicsBackend>(world: &mut World) {
    let dt = tick_seconds::<B>(world);
    if dt <= 0.0 {
        return;
    }
    let gravity = gravity(world);

    let entities: Vec<(Entity, MotionState, TuningParameters, PhysicsModifiers, Vec3)> = world
        .query_filtered::<(
            Entity,
            &MotionState,
            &TuningParameters,
            &PhysicsModifiers,
            &ExternalForces,
        ), Active>()
        .iter(world)
        .map(|(entity, state, tuning, modifiers, forces)| {
            (entity, *state, *tuning, *modifiers, forces.applied())
        })
        .collect();

    for (entity, state, tuning, modifiers, applied) in entities {
        let body_velocity = B::get_velocity(world, entity);
        let params = RegimeParams::resolve(state.regime, &tuning, &modifiers, &gravity);
        let step = IntegrationStep {
            velocity: body_velocity - applied,
            wish_direction: state.wish_direction,
            regime: state.regime,
            slope_normal: state.slope_normal,
            dt,
        };
        let target = step.integrate(&params);
        if let Some(mut state) = world.get_mut::<MotionState>(entity) {
            state.linear_velocity = target;
        }
    }
}

/// Inject impulses for hard contacts with other dynamic bodies.
pub fn react_to_impacts<B: MotionPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, ExternalForceConfig)> = world
        .query_filtered::<(Entity, &ExternalForceConfig), Active>()
        .iter(world)
        .map(|(entity, config)| (entity, *config))
        .collect();

    for (entity, config) in entities {
        let impulses: Vec<(Entity, Vec3)> = B::dynamic_contacts(world, entity)
            .into_iter()
            .filter_map(|contact| {
                impact_impulse(contact.separation, contact.relative_velocity, &config)
                    .map(|impulse| (contact.other, impulse))
            })
            .collect();
        if impulses.is_empty() {
            continue;
        }
        if let Some(mut forces) = world.get_mut::<ExternalForces>(entity) {
            for (other, impulse) in impulses {
                debug!("{entity}: impact from {other}, impulse {impulse}");
                forces.apply_impulse(impulse, IMPACT_SOURCE, &config);
            }
        }
    }
}

/// Decay the external ledger, blend it in, and command the body.
///
/// The difference between the final velocity and the body's current velocity
/// is applied as a force that the solver realizes within the tick.
pub fn blend_external_velocity<B: MotionPhysicsBackend>(world: &mut World) {
    let dt = tick_seconds::<B>(world);
    if dt <= 0.0 {
        return;
    }

    let entities: Vec<(Entity, MotionState, ExternalForceConfig)> = world
        .query_filtered::<(Entity, &MotionState, &ExternalForceConfig), Active>()
        .iter(world)
        .map(|(entity, state, config)| (entity, *state, *config))
        .collect();

    for (entity, state, config) in entities {
        let Some(mut forces) = world.get_mut::<ExternalForces>(entity) else {
            continue;
        };
        forces.tick(dt, &config);
        let has_input = state.wish_direction != Vec3::ZERO;
        let contribution = forces.blend(state.grounded, has_input, &config);
        forces.set_applied(contribution);

        let final_velocity = state.linear_velocity + contribution;
        if let Some(mut state) = world.get_mut::<MotionState>(entity) {
            state.linear_velocity = final_velocity;
        }

        let body_velocity = B::get_velocity(world, entity);
        let mass = B::get_mass(world, entity);
        let force = velocity_change_force(body_velocity, final_velocity, mass, dt);
        B::apply_force(world, entity, force);
    }
}

/// Run the jump state machine and apply its impulse or swim force.
pub fn update_jump<B: MotionPhysicsBackend>(world: &mut World) {
    let dt = tick_seconds::<B>(world);
    let up = gravity(world).up();

    let entities: Vec<(Entity, JumpInput, TuningParameters)> = world
        .query_filtered::<(Entity, &MovementIntent, &MotionState, &TuningParameters), (
            Active,
            Without<InertBody>,
        )>()
        .iter(world)
        .map(|(entity, intent, state, tuning)| {
            let input = JumpInput {
                edges: intent.edges(),
                jump_held: intent.jump_pressed,
                grounded: state.grounded,
                on_slope: state.on_slope,
                submerged: state.in_water,
                dt,
            };
            (entity, input, *tuning)
        })
        .collect();

    for (entity, input, tuning) in entities {
        let Some(mut jump) = world.get_mut::<JumpState>(entity) else {
            continue;
        };
        match jump.tick(input, &tuning) {
            JumpAction::Jump(strength) => {
                debug!("{entity}: jump");
                B::apply_impulse(world, entity, up * strength);
            }
            JumpAction::Swim(strength) => B::apply_force(world, entity, up * strength),
            JumpAction::None => {}
        }
    }
}

/// Run the crouch state machine and apply scale changes and push forces.
pub fn update_crouch<B: MotionPhysicsBackend>(world: &mut World) {
    let up = gravity(world).up();

    let entities: Vec<(Entity, CrouchInput, CrouchState, TuningParameters, TuningBaseline)> = world
        .query_filtered::<(
            Entity,
            &MovementIntent,
            &MotionState,
            &Sensors,
            &CrouchState,
            &TuningParameters,
            &TuningBaseline,
        ), (Active, Without<InertBody>)>()
        .iter(world)
        .map(|(entity, intent, state, sensors, crouch, tuning, baseline)| {
            let input = CrouchInput {
                edges: intent.edges(),
                crouch_held: intent.crouch_pressed,
                grounded: state.grounded,
                submerged: state.in_water,
                ceiling_clear: sensors.ceiling_clear(),
            };
            (entity, input, *crouch, *tuning, *baseline)
        })
        .collect();

    for (entity, input, mut crouch, mut tuning, baseline) in entities {
        let was_crouching = crouch.is_crouching;
        let outcome = crouch.tick(input, &mut tuning, &baseline);

        if let Some(mut stored) = world.get_mut::<CrouchState>(entity) {
            *stored = crouch;
        }
        if let Some(mut stored) = world.get_mut::<TuningParameters>(entity) {
            if *stored != tuning {
                *stored = tuning;
            }
        }

        if let Some(scale_y) = outcome.scale_y {
            if crouch.is_crouching != was_crouching {
                debug!(
                    "{entity}: {}",
                    if crouch.is_crouching { "crouch" } else { "uncrouch" }
                );
            }
            B::set_body_height_scale(world, entity, scale_y);
        }
        if let Some(strength) = outcome.down_force {
            B::apply_force(world, entity, -up * strength);
        }
    }
}

/// Decide whether to attach to, or detach from, a moving platform.
///
/// Only records the request; the hierarchy changes after the physics step.
pub fn plan_platform_attachment(
    platforms: Query<(), With<MovingPlatform>>,
    mut q: Query<(Entity, &Sensors, &mut PlatformAttachment), Active>,
) {
    for (entity, sensors, mut attachment) in &mut q {
        let surface = sensors
            .resting_contact
            .filter(|&surface| surface != entity && platforms.contains(surface));
        if let Some(request) = attachment.plan(surface) {
            debug!("{entity}: planned {request:?}");
        }
    }
}

/// Update every moving platform's velocity from its position delta.
pub fn track_platform_velocity<B: MotionPhysicsBackend>(world: &mut World) {
    let dt = tick_seconds::<B>(world);
    let platforms: Vec<Entity> = world
        .query_filtered::<Entity, With<MovingPlatform>>()
        .iter(world)
        .collect();

    for entity in platforms {
        let position = B::get_position(world, entity);
        if let Some(mut platform) = world.get_mut::<MovingPlatform>(entity) {
            platform.track(position, dt);
        }
    }
}

/// Produce footstep cues for the audio layer.
pub fn emit_footstep_cues<B: MotionPhysicsBackend>(world: &mut World) {
    let dt = tick_seconds::<B>(world);

    let entities: Vec<(Entity, MotionState, bool, Option<Entity>)> = world
        .query_filtered::<(Entity, &MotionState, &JumpState, &Sensors), (
            Active,
            With<FootstepState>,
        )>()
        .iter(world)
        .map(|(entity, state, jump, sensors)| {
            (entity, *state, jump.jumped, sensors.ground_entity())
        })
        .collect();

    for (entity, state, jumped, ground) in entities {
        let surface = ground
            .and_then(|ground| world.get::<SurfaceMetadata>(ground))
            .map(SurfaceMetadata::tag)
            .unwrap_or_default();
        let speed = B::get_velocity(world, entity).length();
        let input = FootstepInput {
            grounded: state.grounded,
            grounded_changed: state.grounded_changed(),
            jumped,
            speed,
            surface,
            dt,
        };
        if let Some(mut footsteps) = world.get_mut::<FootstepState>(entity) {
            footsteps.tick(input);
        }
    }
}
