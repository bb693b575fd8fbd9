//! JSON payloads for the movement and heartbeat channels.
//!
//! Payloads are field-named JSON objects so consumers can ignore fields they
//! do not know. Snapshot images travel as base64 text inside the movement
//! payload and the key is left out entirely when there is no image.

use crate::constants::{MOVEMENT_CONFIDENCE, NODE_ID, SNAPSHOT_JPEG_QUALITY};
use crate::types::MovementStatus;
use crate::{Error, Result};
use chrono::Utc;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch with microsecond resolution
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Compress an image as JPEG at the given quality
///
/// # Errors
///
/// Returns an error if `OpenCV` cannot encode the image.
pub fn encode_jpeg(image: &Mat, quality: i32) -> Result<Vec<u8>> {
    let mut buffer = Vector::<u8>::new();
    let params = Vector::<i32>::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
    if !imgcodecs::imencode(".jpg", image, &mut buffer, &params)? {
        return Err(Error::Encoding("JPEG encoder rejected the snapshot".to_string()));
    }
    Ok(buffer.to_vec())
}

/// Compress a snapshot crop for the movement payload
///
/// # Errors
///
/// Returns an error if `OpenCV` cannot encode the image.
pub fn encode_snapshot(image: &Mat) -> Result<Vec<u8>> {
    encode_jpeg(image, SNAPSHOT_JPEG_QUALITY)
}

/// Movement update for the actuator and dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementMessage {
    pub status: MovementStatus,
    pub confidence: f64,
    pub target: String,
    pub locked: bool,
    pub timestamp: f64,
    /// JPEG bytes of the episode snapshot
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_image")]
    pub face_image: Option<Vec<u8>>,
}

impl MovementMessage {
    /// Build a movement message; `locked` follows from the status.
    #[must_use]
    pub fn new(status: MovementStatus, target: impl Into<String>, face_image: Option<Vec<u8>>, timestamp: f64) -> Self {
        Self {
            status,
            confidence: MOVEMENT_CONFIDENCE,
            target: target.into(),
            locked: status.is_locked(),
            timestamp,
            face_image,
        }
    }
}

/// Liveness state advertised in heartbeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Online,
}

/// Periodic liveness message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    pub node: String,
    pub status: NodeStatus,
    pub timestamp: f64,
}

impl HeartbeatMessage {
    #[must_use]
    pub fn new(timestamp: f64) -> Self {
        Self {
            node: NODE_ID.to_string(),
            status: NodeStatus::Online,
            timestamp,
        }
    }
}

/// Broker channel a message belongs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Movement,
    Heartbeat,
}

/// Anything the node publishes
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    Movement(MovementMessage),
    Heartbeat(HeartbeatMessage),
}

impl OutgoingMessage {
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::Movement(_) => Channel::Movement,
            Self::Heartbeat(_) => Channel::Heartbeat,
        }
    }

    /// Serialize to the JSON bytes sent on the wire
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Movement(message) => serde_json::to_vec(message)?,
            Self::Heartbeat(message) => serde_json::to_vec(message)?,
        };
        Ok(bytes)
    }
}

/// Parse a movement payload
///
/// # Errors
///
/// Returns an error if the payload is not a valid movement message.
pub fn decode_movement(payload: &[u8]) -> Result<MovementMessage> {
    Ok(serde_json::from_slice(payload)?)
}

/// Parse a heartbeat payload
///
/// # Errors
///
/// Returns an error if the payload is not a valid heartbeat message.
pub fn decode_heartbeat(payload: &[u8]) -> Result<HeartbeatMessage> {
    Ok(serde_json::from_slice(payload)?)
}

mod base64_image {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)] // serde `with` hands us `&Option<T>`
    pub fn serialize<S: Serializer>(image: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match image {
            Some(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| BASE64.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
