//! Error types for the vision node.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON payload or identity database (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MQTT client rejected a request
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// No camera could be opened
    #[error("Failed to open camera. Tried indices: {indices:?}")]
    Camera {
        /// Device indices that were probed
        indices: Vec<i32>,
    },

    /// Transport could not be constructed or used
    #[error("Transport error: {0}")]
    Transport(String),

    /// Identity database missing or malformed
    #[error("Identity database error: {0}")]
    IdentityDatabase(String),

    /// Image or payload encoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model loading or inference error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model output processing error
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
