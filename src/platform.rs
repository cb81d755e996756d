//! Moving platform attachment.
//!
//! An entity resting on a [`MovingPlatform`] is re-parented under it so the
//! transform hierarchy carries it along. Attachment decisions are made
//! during the controller tick, but the hierarchy is only changed in
//! [`apply_pending_reparents`], after the physics step has written back.

use bevy::prelude::*;

/// Marks a surface entities may attach to, and tracks its velocity.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct MovingPlatform {
    /// Position delta over the last tick divided by the tick length.
    pub velocity: Vec3,
    previous_position: Option<Vec3>,
}

impl MovingPlatform {
    /// Record this tick's position and update [`velocity`](Self::velocity).
    pub fn track(&mut self, position: Vec3, dt: f32) {
        if let (Some(previous), true) = (self.previous_position, dt > 0.0) {
            self.velocity = (position - previous) / dt;
        }
        self.previous_position = Some(position);
    }
}

/// Which surface, if any, the entity is riding.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttachmentState {
    #[default]
    Detached,
    AttachedTo(Entity),
}

/// A hierarchy change waiting for the end of the tick.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReparentRequest {
    Attach(Entity),
    Detach,
}

/// Non-owning attachment relation of a controlled entity.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct PlatformAttachment {
    /// Parent at initialization; detaching returns here.
    pub initial_parent: Option<Entity>,
    pub state: AttachmentState,
    pub pending: Option<ReparentRequest>,
}

impl PlatformAttachment {
    pub fn new(initial_parent: Option<Entity>) -> Self {
        Self {
            initial_parent,
            ..default()
        }
    }

    /// Decide what to do about this tick's resting contact.
    ///
    /// `surface` is the resting contact, already filtered to moving platforms.
    /// A different surface while attached detaches first; the next tick
    /// attaches to the new one.
    pub fn plan(&mut self, surface: Option<Entity>) -> Option<ReparentRequest> {
        let request = match (self.state, surface) {
            (AttachmentState::Detached, Some(surface)) => Some(ReparentRequest::Attach(surface)),
            (AttachmentState::AttachedTo(current), Some(surface)) if current == surface => None,
            (AttachmentState::AttachedTo(_), _) => Some(ReparentRequest::Detach),
            (AttachmentState::Detached, None) => None,
        };
        self.pending = request;
        request
    }

    pub fn attached_to(&self) -> Option<Entity> {
        match self.state {
            AttachmentState::AttachedTo(surface) => Some(surface),
            AttachmentState::Detached => None,
        }
    }
}

/// World transform of `entity` composed from the local transforms up the
/// hierarchy.
///
/// Independent of transform propagation, so it is exact in the middle of a
/// frame. Returns `None` if the entity has no [`Transform`].
pub fn compose_world_transform(world: &World, entity: Entity) -> Option<GlobalTransform> {
    let local = *world.get::<Transform>(entity)?;
    let mut global = GlobalTransform::from(local);
    let mut current = entity;
    // Bounded walk in case of a malformed hierarchy.
    for _ in 0..64 {
        let Some(parent) = world.get::<ChildOf>(current).map(ChildOf::parent) else {
            break;
        };
        let Some(parent_local) = world.get::<Transform>(parent) else {
            break;
        };
        global = GlobalTransform::from(*parent_local) * global;
        current = parent;
    }
    Some(global)
}

/// Apply every pending attachment change, preserving world transforms.
///
/// A target that no longer exists is logged and the entity stays on its
/// current parent.
pub fn apply_pending_reparents(world: &mut World) {
    let pending: Vec<(Entity, ReparentRequest)> = world
        .query::<(Entity, &PlatformAttachment)>()
        .iter(world)
        .filter_map(|(entity, attachment)| attachment.pending.map(|req| (entity, req)))
        .collect();

    for (entity, request) in pending {
        let (new_parent, new_state) = match request {
            ReparentRequest::Attach(surface) => (Some(surface), AttachmentState::AttachedTo(surface)),
            ReparentRequest::Detach => (detach_target(world, entity), AttachmentState::Detached),
        };

        let result = reparent_preserving_world(world, entity, new_parent);
        if let Some(mut attachment) = world.get_mut::<PlatformAttachment>(entity) {
            attachment.pending = None;
            match result {
                Ok(()) => {
                    debug!("{entity}: {request:?} applied");
                    attachment.state = new_state;
                }
                Err(reason) => warn!("{entity}: {request:?} failed ({reason}), staying on current parent"),
            }
        }
    }
}

/// Parent to return to on detach.
///
/// An initial parent that no longer exists is forgotten, once, and the entity
/// detaches to the root instead.
fn detach_target(world: &mut World, entity: Entity) -> Option<Entity> {
    let initial = world.get::<PlatformAttachment>(entity)?.initial_parent?;
    if compose_world_transform(world, initial).is_some() {
        return Some(initial);
    }
    warn!("{entity}: initial parent {initial} is gone, detaching to the root");
    if let Some(mut attachment) = world.get_mut::<PlatformAttachment>(entity) {
        attachment.initial_parent = None;
    }
    None
}

fn reparent_preserving_world(
    world: &mut World,
    entity: Entity,
    new_parent: Option<Entity>,
) -> Result<(), &'static str> {
    let Some(entity_global) = compose_world_transform(world, entity) else {
        return Err("entity has no transform");
    };

    let local = match new_parent {
        Some(parent) => {
            if parent == entity {
                return Err("cannot parent an entity to itself");
            }
            let Some(parent_global) = compose_world_transform(world, parent) else {
                return Err("target no longer exists");
            };
            entity_global.reparented_to(&parent_global)
        }
        None => entity_global.compute_transform(),
    };

    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return Err("entity despawned");
    };
    entity_mut.insert(local);
    match new_parent {
        Some(parent) => {
            entity_mut.insert(ChildOf(parent));
        }
        None => {
            entity_mut.remove::<ChildOf>();
        }
    }
    Ok(())
}
