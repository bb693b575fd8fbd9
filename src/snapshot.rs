//! One-shot face snapshot per lock episode.
//!
//! The first frame of a lock episode in which the target is visible yields a
//! padded crop of the target for the dashboard. Nothing more is captured until
//! the oracle has gone back to searching and locked again.

use crate::constants::SNAPSHOT_PADDING;
use crate::types::{ControllerState, LockPhase, TargetRegion};
use crate::utils::expand_box;
use crate::Result;
use log::info;
use opencv::core::{Mat, Rect, Size};
use opencv::prelude::*;

/// Decide whether this frame captures the episode's snapshot and, if so,
/// which rectangle of a `frame_size` frame to crop.
///
/// Resets `state.snapshot_sent` on searching frames and sets it when a crop
/// is planned.
pub fn plan_capture(
    phase: LockPhase,
    region: Option<&TargetRegion>,
    frame_size: Size,
    state: &mut ControllerState,
) -> Option<Rect> {
    match (phase, region) {
        (LockPhase::Searching, _) => {
            if state.snapshot_sent {
                state.snapshot_sent = false;
                info!("Target lost, snapshot flag reset");
            }
            None
        }
        (LockPhase::Locked, Some(region)) if !state.snapshot_sent => {
            let rect = expand_box(region, SNAPSHOT_PADDING, frame_size.width, frame_size.height);
            if rect.width <= 0 || rect.height <= 0 {
                return None;
            }
            state.snapshot_sent = true;
            info!("Face snapshot captured ({}x{})", rect.width, rect.height);
            Some(rect)
        }
        _ => None,
    }
}

/// Crop the episode's snapshot from `frame` if this frame is the one to take it.
///
/// # Errors
///
/// Returns an error if the frame size cannot be read or the crop fails.
pub fn maybe_capture(
    phase: LockPhase,
    region: Option<&TargetRegion>,
    frame: &Mat,
    state: &mut ControllerState,
) -> Result<Option<Mat>> {
    let size = frame.size()?;
    match plan_capture(phase, region, size, state) {
        Some(rect) => Ok(Some(Mat::roi(frame, rect)?.try_clone()?)),
        None => Ok(None),
    }
}
