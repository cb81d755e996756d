//! # `quake_motion_controller`
//!
//! Quake-style rigid-body character motion for Bevy with physics backend abstraction.
//!
//! This crate provides a fixed-timestep movement core that:
//! - Accelerates toward a wish direction with regime-dependent friction
//!   (ground, slope, air, water)
//! - Supports coyote-time jumping and ceiling-gated crouching
//! - Blends decaying external pushes (impacts, wind) with controlled movement
//! - Rides moving platforms by re-parenting onto them
//! - Abstracts the physics backend for easy swapping (Rapier3D included)
//!
//! ## Architecture
//!
//! Every fixed tick runs the same pipeline:
//! 1. Sensors refresh (ground, slope, water, resting contact, ceiling)
//! 2. The movement intent becomes a world-space wish direction
//! 3. The integrator computes the target velocity for the active regime
//! 4. The external force ledger decays and is blended in
//! 5. The jump/crouch state machines apply impulses and shape changes
//! 6. Platform attachment is planned, then applied after the physics step
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use quake_motion_controller::prelude::*;
//!
//! // Components for a player; MotionController pulls in the rest.
//! let tuning = TuningParameters::player().with_jump_force(12.0);
//! let probes = ProbeConfig::default();
//! let intent = MovementIntent::default();
//! # let _ = (MotionController, tuning, probes, intent);
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod body;
pub mod collision;
pub mod config;
pub mod crouch;
pub mod detection;
pub mod error;
pub mod external;
pub mod footsteps;
pub mod integrator;
pub mod intent;
pub mod jump;
pub mod modifiers;
pub mod platform;
pub mod snapshot;
pub mod state;
pub mod systems;
pub mod variants;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{BodyContact, MotionPhysicsBackend};
    pub use crate::body::MotionBody;
    pub use crate::config::{ExternalForceConfig, MotionGravity, ProbeConfig, TuningParameters};
    pub use crate::detection::{Sensors, SurfaceMetadata, SurfaceTag, WaterVolume};
    pub use crate::error::{ControllerDisabled, ControllerError};
    pub use crate::footsteps::{FootstepCue, FootstepKind, FootstepState};
    pub use crate::intent::MovementIntent;
    pub use crate::modifiers::PhysicsModifiers;
    pub use crate::platform::{AttachmentState, MovingPlatform, PlatformAttachment};
    pub use crate::snapshot::PhysicsSnapshot;
    pub use crate::state::{Airborne, Grounded, MotionState, Regime, Submerged};
    pub use crate::variants::{DebugTeleport, InertBody, KillPlane};
    pub use crate::{MotionController, MotionControllerPlugin, MotionControllerSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, RapierMotionBundle};
}

/// Root marker of a controlled entity.
///
/// Requires every per-entity controller component, so spawning
/// `(MotionController, TuningParameters::player(), ...)` plus a physics body
/// is enough.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
#[require(
    Transform,
    TuningParameters,
    ProbeConfig,
    config::ExternalForceConfig,
    modifiers::PhysicsModifiers,
    detection::Sensors,
    state::MotionState,
    intent::MovementIntent,
    external::ExternalForces,
    jump::JumpState,
    crouch::CrouchState,
    platform::PlatformAttachment,
    footsteps::FootstepState,
    backend::ForceAccumulator
)]
pub struct MotionController;

use config::{ProbeConfig, TuningParameters};

/// System sets of the controller tick, in execution order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionControllerSet {
    /// Initialization, force accumulator reset, debug affordances.
    Preparation,
    /// Backend probes write [`Sensors`](detection::Sensors).
    Sensors,
    /// Motion state and regime markers.
    State,
    /// Input edges and wish direction.
    Intent,
    Integration,
    ExternalForces,
    JumpCrouch,
    /// Attachment planning, platform velocity, footstep cues.
    Attachment,
    /// Backend writes accumulated forces to the engine.
    FinalApplication,
    /// Deferred re-parenting, in `FixedPostUpdate`.
    Reparent,
}

/// Main plugin for the motion controller.
///
/// Generic over a physics backend `B` which provides the actual body
/// operations and the sensor probes.
///
/// # Examples
///
/// With the Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use quake_motion_controller::prelude::*;
///
/// App::new()
///     .add_plugins(MinimalPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(MotionControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct MotionControllerPlugin<B: backend::MotionPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::MotionPhysicsBackend> Default for MotionControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::MotionPhysicsBackend> Plugin for MotionControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        app.register_type::<MotionController>();
        app.register_type::<TuningParameters>();
        app.register_type::<ProbeConfig>();
        app.register_type::<config::ExternalForceConfig>();
        app.register_type::<config::MotionGravity>();
        app.register_type::<modifiers::PhysicsModifiers>();
        app.register_type::<detection::Sensors>();
        app.register_type::<detection::WaterVolume>();
        app.register_type::<state::MotionState>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::Submerged>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<external::ExternalForces>();
        app.register_type::<jump::JumpState>();
        app.register_type::<crouch::CrouchState>();
        app.register_type::<platform::PlatformAttachment>();
        app.register_type::<platform::MovingPlatform>();
        app.register_type::<footsteps::FootstepState>();
        app.register_type::<variants::InertBody>();
        app.register_type::<variants::DebugTeleport>();
        app.register_type::<variants::KillPlane>();

        app.init_resource::<config::MotionGravity>();

        app.configure_sets(
            FixedUpdate,
            (
                MotionControllerSet::Preparation,
                MotionControllerSet::Sensors,
                MotionControllerSet::State,
                MotionControllerSet::Intent,
                MotionControllerSet::Integration,
                MotionControllerSet::ExternalForces,
                MotionControllerSet::JumpCrouch,
                MotionControllerSet::Attachment,
                MotionControllerSet::FinalApplication,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.add_systems(
            FixedUpdate,
            (
                systems::initialize_controllers::<B>,
                variants::apply_debug_teleports::<B>,
                variants::apply_kill_planes::<B>,
            )
                .chain()
                .in_set(MotionControllerSet::Preparation),
        );
        app.add_systems(
            FixedUpdate,
            (systems::update_motion_state, systems::sync_state_markers)
                .chain()
                .in_set(MotionControllerSet::State),
        );
        app.add_systems(
            FixedUpdate,
            (
                systems::latch_intent_edges,
                systems::compute_wish_direction::<B>,
            )
                .chain()
                .in_set(MotionControllerSet::Intent),
        );
        app.add_systems(
            FixedUpdate,
            systems::integrate_velocity::<B>.in_set(MotionControllerSet::Integration),
        );
        app.add_systems(
            FixedUpdate,
            (
                systems::react_to_impacts::<B>,
                systems::blend_external_velocity::<B>,
            )
                .chain()
                .in_set(MotionControllerSet::ExternalForces),
        );
        app.add_systems(
            FixedUpdate,
            (systems::update_jump::<B>, systems::update_crouch::<B>)
                .chain()
                .in_set(MotionControllerSet::JumpCrouch),
        );
        app.add_systems(
            FixedUpdate,
            (
                systems::plan_platform_attachment,
                systems::track_platform_velocity::<B>,
                systems::emit_footstep_cues::<B>,
            )
                .chain()
                .in_set(MotionControllerSet::Attachment),
        );

        // Hierarchy changes wait until the physics step has written back.
        app.add_systems(
            FixedPostUpdate,
            platform::apply_pending_reparents.in_set(MotionControllerSet::Reparent),
        );
    }
}
