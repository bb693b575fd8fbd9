use crate::types::TargetRegion;
use crate::{Error, Result};
use opencv::core::{Mat, Point2f, Rect, Size, Vector};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::path::Path;

/// Cascade pyramid scale step
const SCALE_FACTOR: f64 = 1.1;

/// Neighbouring detections required to keep a candidate
const MIN_NEIGHBORS: i32 = 5;

/// Face detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDetection {
    /// Bounding box of the detected face
    pub bbox: Rect,
}

impl FaceDetection {
    /// Bounding box as a target region
    #[must_use]
    pub fn region(&self) -> TargetRegion {
        TargetRegion::from_rect(self.bbox)
    }
}

/// Frontal face detector backed by an `OpenCV` Haar cascade
pub struct FaceDetector {
    classifier: CascadeClassifier,
    min_size: Size,
}

impl FaceDetector {
    /// Load a cascade from an XML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or does not hold a cascade.
    pub fn new<P: AsRef<Path>>(cascade_path: P, min_face_size: i32) -> Result<Self> {
        let path = cascade_path.as_ref();
        log::info!("Loading face cascade from {}", path.display());
        if !path.exists() {
            return Err(Error::ModelError(format!("Face cascade not found: {}", path.display())));
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 cascade path: {}", path.display())))?;
        let classifier = CascadeClassifier::new(path_str)?;
        if classifier.empty()? {
            return Err(Error::ModelError(format!("Failed to load cascade: {}", path.display())));
        }

        Ok(Self {
            classifier,
            min_size: Size::new(min_face_size, min_face_size),
        })
    }

    /// Detect faces in a BGR image
    ///
    /// # Errors
    ///
    /// Returns an error if color conversion or detection fails.
    pub fn detect(&mut self, image: &Mat) -> Result<Vec<FaceDetection>> {
        let mut gray = Mat::default();
        imgproc::cvt_color(image, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let mut faces = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &gray,
            &mut faces,
            SCALE_FACTOR,
            MIN_NEIGHBORS,
            0,
            self.min_size,
            Size::default(),
        )?;

        Ok(faces.iter().map(|bbox| FaceDetection { bbox }).collect())
    }
}

/// Approximate five facial keypoints from a face box.
///
/// Order: left eye, right eye, nose tip, left mouth corner, right mouth corner.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn approximate_keypoints(bbox: Rect) -> [Point2f; 5] {
    let (x, y) = (bbox.x as f32, bbox.y as f32);
    let (w, h) = (bbox.width as f32, bbox.height as f32);
    [
        Point2f::new(x + 0.32 * w, y + 0.40 * h),
        Point2f::new(x + 0.68 * w, y + 0.40 * h),
        Point2f::new(x + 0.50 * w, y + 0.58 * h),
        Point2f::new(x + 0.38 * w, y + 0.74 * h),
        Point2f::new(x + 0.62 * w, y + 0.74 * h),
    ]
}

/// Swap eye and mouth pairs so the left point of each pair comes first
pub fn order_keypoints(points: &mut [Point2f; 5]) {
    if points[0].x > points[1].x {
        points.swap(0, 1);
    }
    if points[3].x > points[4].x {
        points.swap(3, 4);
    }
}
