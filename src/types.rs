//! Shared value types for the decision and publication controller.

use opencv::core::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Tracking state reported by the lock oracle for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockPhase {
    /// No commitment to a target
    Searching,
    /// Committed to the enrolled target across frames
    Locked,
}

impl fmt::Display for LockPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searching => f.write_str("SEARCHING"),
            Self::Locked => f.write_str("LOCKED"),
        }
    }
}

/// Discrete command sent to the actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    /// Searching, no target to follow
    NoFace,
    /// Target is left of the deadband
    MoveLeft,
    /// Target is right of the deadband
    MoveRight,
    /// Target is inside the deadband
    Centered,
}

impl MovementStatus {
    /// All statuses, in wire order
    pub const ALL: [Self; 4] = [Self::NoFace, Self::MoveLeft, Self::MoveRight, Self::Centered];

    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoFace => "NO_FACE",
            Self::MoveLeft => "MOVE_LEFT",
            Self::MoveRight => "MOVE_RIGHT",
            Self::Centered => "CENTERED",
        }
    }

    /// Whether the actuator should consider the target locked
    #[must_use]
    pub const fn is_locked(self) -> bool {
        !matches!(self, Self::NoFace)
    }
}

impl fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned target box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRegion {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl TargetRegion {
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from an `OpenCV` rectangle
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Pixel coordinates fit in f32
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            x1: rect.x as f32,
            y1: rect.y as f32,
            x2: (rect.x + rect.width) as f32,
            y2: (rect.y + rect.height) as f32,
        }
    }

    /// Truncate to an `OpenCV` rectangle
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_rect(&self) -> Rect {
        let x = self.x1 as i32;
        let y = self.y1 as i32;
        Rect::new(x, y, self.x2 as i32 - x, self.y2 as i32 - y)
    }

    #[must_use]
    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    #[must_use]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another region
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= crate::constants::EPSILON {
            0.0
        } else {
            intersection / union
        }
    }
}

/// State carried from frame to frame by the controller
///
/// Owned by the single frame-processing path; every step of the pipeline
/// takes it by `&mut` so tests can start from any prior state.
#[derive(Debug, Clone, Default)]
pub struct ControllerState {
    /// Last status computed while the target was visible; `None` until the
    /// first lock with a visible target
    pub last_status: Option<MovementStatus>,
    /// Whether the current lock episode has already produced its snapshot
    pub snapshot_sent: bool,
    /// When a movement message was last admitted
    pub last_movement_publish_at: Option<Instant>,
    /// When a heartbeat was last admitted
    pub last_heartbeat_at: Option<Instant>,
}

impl ControllerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
