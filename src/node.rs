//! Frame loop tying the oracle, controller and transport together.

use crate::camera::FrameSource;
use crate::codec::{encode_snapshot, unix_timestamp, HeartbeatMessage, MovementMessage, OutgoingMessage};
use crate::display::PreviewWindow;
use crate::movement;
use crate::oracle::LockOracle;
use crate::scheduler::PublishScheduler;
use crate::snapshot;
use crate::transport::{Topics, Transport, TransportEvent};
use crate::types::{ControllerState, LockPhase, MovementStatus};
use crate::Result;
use log::{debug, info, warn};
use opencv::core::{self, Mat};
use opencv::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What happened on one processed frame
#[derive(Debug)]
pub struct FrameOutcome {
    /// Oracle frame with overlays
    pub rendered: Mat,
    pub phase: LockPhase,
    pub status: MovementStatus,
    /// A snapshot crop was taken this frame
    pub snapshot_taken: bool,
    /// Movement message handed to the transport, if the gate admitted one
    pub movement: Option<MovementMessage>,
    /// Heartbeats handed to the transport (connection announcement and timer)
    pub heartbeats: usize,
}

/// The vision node
pub struct VisionNode<S, O, T> {
    source: S,
    oracle: O,
    transport: T,
    display: Option<PreviewWindow>,
    topics: Topics,
    scheduler: PublishScheduler,
    state: ControllerState,
    mirror: bool,
    stop: Arc<AtomicBool>,
    /// Consecutive publishes the transport refused
    publish_failures: u64,
}

/// Tracking half of a frame's outcome
struct Tracked {
    rendered: Mat,
    phase: LockPhase,
    status: MovementStatus,
    snapshot_taken: bool,
    movement: Option<MovementMessage>,
}

impl<S: FrameSource, O: LockOracle, T: Transport> VisionNode<S, O, T> {
    /// Create a node with a fresh controller state
    pub fn new(source: S, oracle: O, transport: T, topics: Topics) -> Self {
        Self {
            source,
            oracle,
            transport,
            display: None,
            topics,
            scheduler: PublishScheduler::default(),
            state: ControllerState::new(),
            mirror: false,
            stop: Arc::new(AtomicBool::new(false)),
            publish_failures: 0,
        }
    }

    /// Mirror frames horizontally before they reach the oracle
    #[must_use]
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Show rendered frames and honour the quit key
    #[must_use]
    pub fn with_display(mut self, window: PreviewWindow) -> Self {
        self.display = Some(window);
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: PublishScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Flag that ends the frame loop after the current frame
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    #[must_use]
    pub const fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Publishes refused in a row since the last accepted one
    #[must_use]
    pub const fn publish_failures(&self) -> u64 {
        self.publish_failures
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the decision and publication pipeline on one frame at time `now`
    ///
    /// The heartbeat gate is evaluated even when tracking fails on this frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the oracle, the crop, or payload encoding fails.
    /// Transport refusals are logged, not returned.
    pub fn process_frame(&mut self, frame: &Mat, now: Instant) -> Result<FrameOutcome> {
        let mut heartbeats = self.handle_transport_events(now)?;

        let tracked = self.track(frame, now);

        if self.scheduler.admit_heartbeat(&mut self.state, now) {
            self.publish_heartbeat()?;
            heartbeats += 1;
        }

        let tracked = tracked?;
        Ok(FrameOutcome {
            rendered: tracked.rendered,
            phase: tracked.phase,
            status: tracked.status,
            snapshot_taken: tracked.snapshot_taken,
            movement: tracked.movement,
            heartbeats,
        })
    }

    /// Oracle, decision, snapshot gate and movement publish for one frame
    fn track(&mut self, frame: &Mat, now: Instant) -> Result<Tracked> {
        let mut mirrored = Mat::default();
        let frame = if self.mirror {
            core::flip(frame, &mut mirrored, 1)?;
            &mirrored
        } else {
            frame
        };

        let observation = self.oracle.process(frame)?;
        let region = observation.region.as_ref();

        let status = movement::decide(observation.phase, region, frame.cols(), &mut self.state);
        let snapshot = snapshot::maybe_capture(observation.phase, region, frame, &mut self.state)?;
        let snapshot_taken = snapshot.is_some();

        let movement = if self.scheduler.admit_movement(&mut self.state, now) {
            let face_image = snapshot.as_ref().and_then(|crop| match encode_snapshot(crop) {
                Ok(jpeg) => Some(jpeg),
                Err(e) => {
                    warn!("Snapshot encoding failed, publishing without image: {e}");
                    None
                }
            });
            let message = MovementMessage::new(status, self.oracle.target_name(), face_image, unix_timestamp());
            debug!(
                "Published: {} (image: {})",
                message.status,
                if message.face_image.is_some() { "yes" } else { "no" }
            );
            self.publish(&OutgoingMessage::Movement(message.clone()))?;
            Some(message)
        } else {
            None
        };

        Ok(Tracked {
            rendered: observation.rendered,
            phase: observation.phase,
            status,
            snapshot_taken,
            movement,
        })
    }

    /// React to connection events; announces liveness on each connect.
    fn handle_transport_events(&mut self, now: Instant) -> Result<usize> {
        let mut heartbeats = 0;
        for event in self.transport.drain_events() {
            match event {
                TransportEvent::Connected => {
                    if self.scheduler.announce_connected(&mut self.state, now) {
                        self.publish_heartbeat()?;
                        heartbeats += 1;
                    }
                }
                TransportEvent::Disconnected(reason) => debug!("Transport disconnected: {reason}"),
            }
        }
        Ok(heartbeats)
    }

    fn publish_heartbeat(&mut self) -> Result<()> {
        self.publish(&OutgoingMessage::Heartbeat(HeartbeatMessage::new(unix_timestamp())))
    }

    fn publish(&mut self, message: &OutgoingMessage) -> Result<()> {
        let payload = message.to_payload()?;
        let topic = self.topics.topic(message.channel());
        match self.transport.publish(topic, payload) {
            Ok(()) => {
                if self.publish_failures > 0 {
                    info!("Publishing resumed after {} failed attempts", self.publish_failures);
                    self.publish_failures = 0;
                }
            }
            Err(e) => {
                // Only the first failure of a streak is worth a warning
                if self.publish_failures == 0 {
                    warn!("Publish to {topic} failed: {e}");
                } else {
                    debug!("Publish to {topic} failed: {e}");
                }
                self.publish_failures += 1;
            }
        }
        Ok(())
    }

    /// Drive the frame loop until the stream ends, quit is pressed, or the
    /// stop flag is raised.
    ///
    /// # Errors
    ///
    /// Returns an error only if the preview window fails; frame-level
    /// failures are logged and skipped.
    pub fn run(&mut self) -> Result<()> {
        info!("Vision node started. Tracking target: {}", self.oracle.target_name());
        info!("Publishing to {}", self.topics.movement);

        let mut frame_count: u64 = 0;
        while !self.stop.load(Ordering::SeqCst) {
            let frame = match self.source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("End of video stream");
                    break;
                }
                Err(e) => {
                    warn!("Camera read failed: {e}");
                    break;
                }
            };
            frame_count += 1;

            let outcome = match self.process_frame(&frame, Instant::now()) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Frame {frame_count} skipped: {e}");
                    continue;
                }
            };

            if let Some(window) = &self.display {
                if window.show(&outcome.rendered)? {
                    info!("Exit requested by user");
                    break;
                }
            }
        }

        info!("Frame loop finished after {frame_count} frames");
        Ok(())
    }

    /// Release the camera, close the display, then stop the transport.
    ///
    /// Every step is attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while releasing resources.
    pub fn shutdown(mut self) -> Result<()> {
        info!("Vision node shutting down");
        let camera = self.source.release();
        let display = self.display.take().map_or(Ok(()), PreviewWindow::close);
        let transport = self.transport.stop();
        camera.and(display).and(transport)
    }
}
