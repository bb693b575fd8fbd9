//! Vision node: face lock tracking that publishes movement commands.
//!
//! The node reads webcam frames, asks a lock oracle whether the configured
//! target is locked and where it is, and turns that into:
//! - a movement status (`MOVE_LEFT`, `MOVE_RIGHT`, `CENTERED`, `NO_FACE`)
//!   published at most every 100 ms
//! - one JPEG snapshot of the target per lock episode, attached to a movement
//!   message
//! - a heartbeat every 5 seconds and on every broker (re)connect
//!
//! The pipeline consists of:
//! 1. Face detection (Haar cascade via `OpenCV`)
//! 2. Face embedding (ONNX Runtime) matched against an identity database
//! 3. Lock hysteresis over consecutive frames
//! 4. Movement decision, snapshot gate and publish scheduling
//! 5. JSON encoding and MQTT publication
//!
//! # Examples
//!
//! ## Movement Decision
//!
//! ```no_run
//! use vision_node::{movement, types::{ControllerState, LockPhase, TargetRegion}};
//!
//! let mut state = ControllerState::new();
//! let face = TargetRegion::new(500.0, 100.0, 600.0, 200.0);
//! let status = movement::decide(LockPhase::Locked, Some(&face), 640, &mut state);
//! println!("{status}");
//! ```
//!
//! ## Complete Node
//!
//! ```no_run
//! use vision_node::{
//!     camera::CameraSource, config::Config, node::VisionNode,
//!     oracle::FaceLockOracle, transport::{MqttTransport, Topics},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let transport = MqttTransport::connect(&config.broker)?;
//! let oracle = FaceLockOracle::new(&config)?;
//! let camera = CameraSource::open(&config.camera)?;
//!
//! let mut node = VisionNode::new(camera, oracle, transport, Topics::for_team(&config.broker.team_id))
//!     .with_mirror(config.camera.mirror);
//! node.run()?;
//! node.shutdown()?;
//! # Ok(())
//! # }
//! ```

/// Frame sources and camera probing
pub mod camera;

/// Command line options for the node binary
pub mod cli;

/// JSON payloads and JPEG snapshot encoding
pub mod codec;

/// Configuration management
pub mod config;

/// Constants used throughout the application
pub mod constants;

/// Preview window
pub mod display;

/// Face embedding model
pub mod embedding;

/// Error types and result handling
pub mod error;

/// Haar cascade face detection
pub mod face_detection;

/// Lock acquisition and release hysteresis
pub mod face_lock;

/// Known identity embeddings
pub mod identity;

/// Movement decision engine
pub mod movement;

/// Frame loop orchestration
pub mod node;

/// Lock oracle trait and face recognition implementation
pub mod oracle;

/// Publish rate limiting and heartbeat timing
pub mod scheduler;

/// One-snapshot-per-episode gate
pub mod snapshot;

/// Message transport and MQTT adapter
pub mod transport;

/// Shared domain types
pub mod types;

/// Utility functions for image processing and numeric conversion
pub mod utils;

pub use error::{Error, Result};
