//! Constants used throughout the node

use std::time::Duration;

/// Normalized horizontal centre below which the target is left of the deadband
pub const DEADBAND_LEFT: f32 = 0.4;

/// Normalized horizontal centre above which the target is right of the deadband
pub const DEADBAND_RIGHT: f32 = 0.6;

/// Pixels added on every side of the target box when cropping a snapshot
pub const SNAPSHOT_PADDING: i32 = 20;

/// JPEG quality for embedded snapshots
pub const SNAPSHOT_JPEG_QUALITY: i32 = 70;

/// Minimum spacing between movement publishes (10 Hz cap)
pub const MOVEMENT_PUBLISH_INTERVAL: Duration = Duration::from_millis(100);

/// Heartbeat period; a heartbeat goes out once strictly more than this has elapsed
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Confidence reported with every movement message
pub const MOVEMENT_CONFIDENCE: f64 = 1.0;

/// Node identifier carried in heartbeats
pub const NODE_ID: &str = "pc_vision";

/// Broker defaults
pub const DEFAULT_BROKER_ADDRESS: &str = "10.12.75.96";
pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1024 * 1024;
pub const DEFAULT_TEAM_ID: &str = "dragonfly";

/// Camera indices probed in order when none are configured
pub const DEFAULT_CAMERA_INDICES: [i32; 4] = [0, 1, 2, 3];

/// Image normalization constants for the face embedder
pub const IMAGE_NORMALIZATION_OFFSET: f32 = 127.5;
pub const IMAGE_NORMALIZATION_SCALE: f32 = 128.0;

/// Face embedder input side length
pub const EMBEDDER_INPUT_SIZE: i32 = 112;

/// Maximum cosine distance accepted as an identity match
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.60;

/// Numeric precision epsilon
pub const EPSILON: f32 = 1e-10;
