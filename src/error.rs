//! Configuration errors.
//!
//! The tick itself never fails; these are raised once, when a controller is
//! first initialized, and disable the offending entity.

use bevy::prelude::*;
use thiserror::Error;

/// Reasons a controller cannot run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("entity {0} has no physics body the backend can drive")]
    MissingBody(Entity),

    #[error("entity {0} has no ground probe configured")]
    MissingGroundProbe(Entity),

    #[error("tuning field `{field}` has unusable value {value}")]
    InvalidTuning { field: &'static str, value: f32 },
}

/// Marks a controller that failed initialization.
///
/// Every tick system skips entities carrying this component.
#[derive(Component, Debug, Clone)]
pub struct ControllerDisabled(pub ControllerError);
