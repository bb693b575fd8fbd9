//! Frame acquisition.

use crate::config::CameraConfig;
use crate::{Error, Result};
use log::{debug, info, warn};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE};

/// Source of video frames for the node
pub trait FrameSource {
    /// Next frame, or `None` at end of stream
    ///
    /// # Errors
    ///
    /// Returns an error if the device fails while reading.
    fn read_frame(&mut self) -> Result<Option<Mat>>;

    /// Release the underlying device
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be released cleanly.
    fn release(&mut self) -> Result<()>;
}

/// Try each index in order with `open` and return the first device that opens.
///
/// # Errors
///
/// Returns `Error::Camera` listing every index tried when none open.
pub fn open_first<T, F>(indices: &[i32], mut open: F) -> Result<(T, i32)>
where
    F: FnMut(i32) -> Result<Option<T>>,
{
    for &index in indices {
        match open(index) {
            Ok(Some(device)) => return Ok((device, index)),
            Ok(None) => debug!("Camera {index} did not open"),
            Err(e) => warn!("Camera {index} failed to open: {e}"),
        }
    }
    Err(Error::Camera {
        indices: indices.to_vec(),
    })
}

/// Webcam frame source
pub struct CameraSource {
    capture: VideoCapture,
    index: i32,
}

impl CameraSource {
    /// Open the first camera in `config.indices` that works
    ///
    /// # Errors
    ///
    /// Returns `Error::Camera` if no configured index opens.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let (capture, index) = open_first(&config.indices, |index| {
            let mut capture = VideoCapture::new(index, videoio::CAP_ANY)?;
            if capture.is_opened()? {
                Ok(Some(capture))
            } else {
                capture.release()?;
                Ok(None)
            }
        })?;

        let mut source = Self { capture, index };
        if config.buffer_size > 0 {
            // Not every backend supports this; a refusal is harmless
            match source.capture.set(CAP_PROP_BUFFERSIZE, f64::from(config.buffer_size)) {
                Ok(true) => debug!("Camera buffer size set to {}", config.buffer_size),
                _ => debug!("Camera backend ignored buffer size"),
            }
        }
        info!("Opened camera {}", source.index);
        Ok(source)
    }

    #[must_use]
    pub const fn index(&self) -> i32 {
        self.index
    }
}

impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        self.capture.release()?;
        info!("Camera {} released", self.index);
        Ok(())
    }
}
