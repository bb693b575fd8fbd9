//! Movement decision engine.
//!
//! Maps the oracle's lock phase and target box to a discrete actuator command.
//! A central deadband of the normalized horizontal position is reported as
//! centred, and while the lock holds but the target is momentarily not
//! re-detected the last directive is repeated instead of dropping to
//! `NO_FACE`.

use crate::constants::{DEADBAND_LEFT, DEADBAND_RIGHT};
use crate::types::{ControllerState, LockPhase, MovementStatus, TargetRegion};

/// Classify a normalized horizontal centre against the deadband.
///
/// Both deadband edges are inclusive to `Centered`.
#[must_use]
pub fn classify(cx_norm: f32) -> MovementStatus {
    if cx_norm < DEADBAND_LEFT {
        MovementStatus::MoveLeft
    } else if cx_norm > DEADBAND_RIGHT {
        MovementStatus::MoveRight
    } else {
        MovementStatus::Centered
    }
}

/// Normalized horizontal centre of `region` in a frame `frame_width` pixels wide
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn normalized_center(region: &TargetRegion, frame_width: i32) -> f32 {
    region.center_x() / frame_width.max(1) as f32
}

/// Decide the movement status for one frame, updating `state.last_status`
/// only when the target was actually visible.
pub fn decide(
    phase: LockPhase,
    region: Option<&TargetRegion>,
    frame_width: i32,
    state: &mut ControllerState,
) -> MovementStatus {
    match (phase, region) {
        (LockPhase::Searching, _) => MovementStatus::NoFace,
        (LockPhase::Locked, Some(region)) => {
            let status = classify(normalized_center(region, frame_width));
            state.last_status = Some(status);
            status
        }
        (LockPhase::Locked, None) => hold(state),
    }
}

/// Status to repeat while locked without a visible target
fn hold(state: &ControllerState) -> MovementStatus {
    match state.last_status {
        None | Some(MovementStatus::NoFace) => MovementStatus::Centered,
        Some(status) => status,
    }
}
