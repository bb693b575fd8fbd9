//! Configuration management for the vision node

use crate::constants::{
    DEFAULT_BROKER_ADDRESS, DEFAULT_BROKER_PORT, DEFAULT_CAMERA_INDICES, DEFAULT_KEEP_ALIVE_SECS,
    DEFAULT_MAX_PACKET_SIZE,
    DEFAULT_MATCH_THRESHOLD, DEFAULT_TEAM_ID,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection settings
    pub broker: BrokerConfig,

    /// Identity to lock onto
    pub target: TargetConfig,

    /// Camera acquisition
    pub camera: CameraConfig,

    /// Face detection and recognition models
    pub recognition: RecognitionConfig,

    /// Face-lock hysteresis
    pub lock: LockConfig,

    /// Preview window
    pub display: DisplayConfig,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker host name or address
    pub address: String,

    /// Broker TCP port
    pub port: u16,

    /// Team identifier used in topic names
    pub team_id: String,

    /// MQTT client id; derived from the team id when unset
    pub client_id: Option<String>,

    /// MQTT keep-alive interval in seconds
    pub keep_alive_secs: u64,

    /// Largest MQTT packet in bytes, in either direction; must fit a movement
    /// message carrying a snapshot
    pub max_packet_size: usize,
}

/// Target identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Enrolled identity name to track
    pub name: String,
}

/// Camera acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device indices probed in order
    pub indices: Vec<i32>,

    /// Mirror frames horizontally before processing
    pub mirror: bool,

    /// Driver frame buffer size (1 keeps latency low)
    pub buffer_size: i32,
}

/// Detection and recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Haar cascade XML for frontal faces
    pub cascade_path: PathBuf,

    /// ArcFace-style embedding model
    pub embedder_model: PathBuf,

    /// Identity database (`.npz` or JSON, name -> embedding)
    pub identity_db: PathBuf,

    /// Maximum cosine distance accepted as a match (0.0-2.0)
    pub match_threshold: f32,

    /// Smallest face side in pixels passed to the detector
    pub min_face_size: i32,
}

/// Face-lock hysteresis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Consecutive recognised frames needed to lock
    pub acquire_frames: u32,

    /// Consecutive frames without the target tolerated before unlocking
    pub release_frames: u32,

    /// Minimum overlap with the last target box to keep tracking an unconfirmed face (0.0-1.0)
    pub track_iou: f32,
}

/// Preview window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show the rendered frame
    pub enabled: bool,

    /// Window title
    pub window_name: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BROKER_ADDRESS.to_string(),
            port: DEFAULT_BROKER_PORT,
            team_id: DEFAULT_TEAM_ID.to_string(),
            client_id: None,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl BrokerConfig {
    /// Client id presented to the broker
    #[must_use]
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("{}_vision_node", self.team_id))
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: "andrew".to_string(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            indices: DEFAULT_CAMERA_INDICES.to_vec(),
            mirror: true,
            buffer_size: 1,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            cascade_path: PathBuf::from("assets/haarcascade_frontalface_default.xml"),
            embedder_model: PathBuf::from("assets/embedder_arcface.onnx"),
            identity_db: PathBuf::from("data/db/face_db.npz"),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            min_face_size: 70,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_frames: 3,
            release_frames: 15,
            track_iou: 0.3,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_name: "Vision Node (Locked)".to_string(),
        }
    }
}

/// Smallest packet limit that still fits a snapshot-free movement message
const MIN_PACKET_SIZE: usize = 1024;

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration values
    ///
    /// Model and database paths are checked when they are opened, not here.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.broker.address.trim().is_empty() {
            return Err(Error::ConfigError("Broker address must not be empty".to_string()));
        }
        if self.broker.port == 0 {
            return Err(Error::ConfigError("Broker port must be greater than 0".to_string()));
        }
        if self.broker.max_packet_size < MIN_PACKET_SIZE {
            return Err(Error::ConfigError(format!(
                "Max packet size must be at least {MIN_PACKET_SIZE} bytes"
            )));
        }
        if self.broker.team_id.trim().is_empty() || self.broker.team_id.contains(&['/', '+', '#'][..]) {
            return Err(Error::ConfigError(
                "Team id must be non-empty and free of MQTT topic separators".to_string(),
            ));
        }
        if self.target.name.trim().is_empty() {
            return Err(Error::ConfigError("Target name must not be empty".to_string()));
        }

        if self.camera.indices.is_empty() {
            return Err(Error::ConfigError("At least one camera index is required".to_string()));
        }
        if self.camera.indices.iter().any(|&i| i < 0) {
            return Err(Error::ConfigError("Camera indices must be non-negative".to_string()));
        }

        if !(0.0..=2.0).contains(&self.recognition.match_threshold) {
            return Err(Error::ConfigError(
                "Match threshold must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.recognition.min_face_size <= 0 {
            return Err(Error::ConfigError("Minimum face size must be greater than 0".to_string()));
        }

        if self.lock.acquire_frames == 0 {
            return Err(Error::ConfigError("Lock acquire frames must be greater than 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.lock.track_iou) {
            return Err(Error::ConfigError("Track IOU must be between 0.0 and 1.0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Vision node configuration

# Broker connection
broker:
  address: "10.12.75.96"
  port: 1883
  team_id: "dragonfly"
  keep_alive_secs: 60
  # Must fit a movement message with its base64 snapshot
  max_packet_size: 1048576

# Identity to follow
target:
  name: "andrew"

# Camera indices are probed in order; the first that opens is used
camera:
  indices: [0, 1, 2, 3]
  mirror: true
  buffer_size: 1

# Detection and recognition
recognition:
  cascade_path: "assets/haarcascade_frontalface_default.xml"
  embedder_model: "assets/embedder_arcface.onnx"
  identity_db: "data/db/face_db.npz"
  match_threshold: 0.6
  min_face_size: 70

# Face-lock hysteresis
lock:
  acquire_frames: 3
  release_frames: 15
  track_iou: 0.3

# Preview window
display:
  enabled: true
  window_name: "Vision Node (Locked)"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.client_id(), "dragonfly_vision_node");
        assert_eq!(config.camera.indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.broker.team_id, "dragonfly");
        assert_eq!(config.lock.release_frames, 15);
        assert!((config.recognition.match_threshold - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("broker:\n  address: \"localhost\"\n").unwrap();
        assert_eq!(config.broker.address, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.target.name, "andrew");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.broker.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.broker.team_id = "a/b".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.camera.indices.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.lock.track_iou = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.target.name = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.broker.max_packet_size = 512;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_packet_size_fits_snapshots() {
        let config = Config::default();
        assert_eq!(config.broker.max_packet_size, 1024 * 1024);

        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.broker.max_packet_size, 1024 * 1024);
    }

    #[test]
    fn test_explicit_client_id() {
        let broker = BrokerConfig {
            client_id: Some("custom".to_string()),
            ..BrokerConfig::default()
        };
        assert_eq!(broker.client_id(), "custom");
    }
}
