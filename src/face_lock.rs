//! Frame-count hysteresis between searching for and locking onto the target.
//!
//! Transitions:
//! - SEARCHING → LOCKED: target recognised in `acquire_frames` consecutive frames
//! - LOCKED → SEARCHING: target missing for more than `release_frames` consecutive frames
//!
//! While locked, frames where the target is missing report no region, which
//! the decision engine treats as "hold position".

use crate::config::LockConfig;
use crate::types::{LockPhase, TargetRegion};
use log::info;

/// Lock state machine fed with the target candidate of each frame
#[derive(Debug, Clone)]
pub struct FaceLock {
    acquire_frames: u32,
    release_frames: u32,
    phase: LockPhase,
    /// Consecutive frames with the target while searching
    streak: u32,
    /// Consecutive frames without the target while locked
    misses: u32,
    last_region: Option<TargetRegion>,
}

impl FaceLock {
    #[must_use]
    pub fn new(acquire_frames: u32, release_frames: u32) -> Self {
        Self {
            acquire_frames: acquire_frames.max(1),
            release_frames,
            phase: LockPhase::Searching,
            streak: 0,
            misses: 0,
            last_region: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(config.acquire_frames, config.release_frames)
    }

    #[must_use]
    pub const fn phase(&self) -> LockPhase {
        self.phase
    }

    /// Target box from the most recent frame in which it was seen
    #[must_use]
    pub const fn last_region(&self) -> Option<&TargetRegion> {
        self.last_region.as_ref()
    }

    /// Advance one frame. Returns the phase and, when locked and visible,
    /// the target region.
    pub fn update(&mut self, candidate: Option<TargetRegion>) -> (LockPhase, Option<TargetRegion>) {
        match (self.phase, candidate) {
            (LockPhase::Searching, Some(region)) => {
                self.streak += 1;
                self.last_region = Some(region);
                if self.streak >= self.acquire_frames {
                    self.phase = LockPhase::Locked;
                    self.misses = 0;
                    info!("Target locked");
                    (LockPhase::Locked, Some(region))
                } else {
                    (LockPhase::Searching, None)
                }
            }
            (LockPhase::Searching, None) => {
                self.streak = 0;
                (LockPhase::Searching, None)
            }
            (LockPhase::Locked, Some(region)) => {
                self.misses = 0;
                self.last_region = Some(region);
                (LockPhase::Locked, Some(region))
            }
            (LockPhase::Locked, None) => {
                self.misses += 1;
                if self.misses > self.release_frames {
                    self.reset();
                    info!("Target lost, searching");
                    (LockPhase::Searching, None)
                } else {
                    (LockPhase::Locked, None)
                }
            }
        }
    }

    /// Drop back to searching
    pub fn reset(&mut self) {
        self.phase = LockPhase::Searching;
        self.streak = 0;
        self.misses = 0;
        self.last_region = None;
    }
}
