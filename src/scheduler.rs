//! Publish-rate gates for movement updates and heartbeats.
//!
//! Both gates are plain deadline checks against the `Instant` the frame loop
//! reads once per frame. They never sleep and never block each other; the
//! loop stays driven by frame arrival.

use crate::constants::{HEARTBEAT_INTERVAL, MOVEMENT_PUBLISH_INTERVAL};
use crate::types::ControllerState;
use std::time::{Duration, Instant};

/// Admission policy for outgoing messages
#[derive(Debug, Clone, Copy)]
pub struct PublishScheduler {
    movement_interval: Duration,
    heartbeat_interval: Duration,
}

impl Default for PublishScheduler {
    fn default() -> Self {
        Self::new(MOVEMENT_PUBLISH_INTERVAL, HEARTBEAT_INTERVAL)
    }
}

impl PublishScheduler {
    #[must_use]
    pub const fn new(movement_interval: Duration, heartbeat_interval: Duration) -> Self {
        Self {
            movement_interval,
            heartbeat_interval,
        }
    }

    #[must_use]
    pub const fn movement_interval(&self) -> Duration {
        self.movement_interval
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Admit a movement publish if at least the movement interval has passed
    /// since the last admitted one.
    pub fn admit_movement(&self, state: &mut ControllerState, now: Instant) -> bool {
        let due = state
            .last_movement_publish_at
            .map_or(true, |last| now.saturating_duration_since(last) >= self.movement_interval);
        if due {
            state.last_movement_publish_at = Some(now);
        }
        due
    }

    /// Admit a heartbeat if strictly more than the heartbeat interval has
    /// passed since the last one.
    pub fn admit_heartbeat(&self, state: &mut ControllerState, now: Instant) -> bool {
        let due = state
            .last_heartbeat_at
            .map_or(true, |last| now.saturating_duration_since(last) > self.heartbeat_interval);
        if due {
            state.last_heartbeat_at = Some(now);
        }
        due
    }

    /// Record the liveness announcement made on a fresh broker connection.
    ///
    /// Always admitted; restarts the heartbeat timer.
    pub fn announce_connected(&self, state: &mut ControllerState, now: Instant) -> bool {
        state.last_heartbeat_at = Some(now);
        true
    }
}
