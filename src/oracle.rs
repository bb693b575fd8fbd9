//! Lock oracle: per-frame answer to "are we locked on the target, and where is it?"
//!
//! The controller only depends on the [`LockOracle`] trait. [`FaceLockOracle`]
//! is the implementation used by the binary: Haar detection, embedding match
//! against the identity database, then [`FaceLock`] hysteresis.

use crate::config::{Config, LockConfig};
use crate::embedding::FaceEmbedder;
use crate::face_detection::FaceDetector;
use crate::face_lock::FaceLock;
use crate::identity::{IdentityDatabase, IdentityMatch};
use crate::types::{LockPhase, TargetRegion};
use crate::Result;
use log::{debug, warn};
use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8};
use opencv::prelude::*;

/// Oracle output for one frame
#[derive(Debug)]
pub struct LockObservation {
    /// Frame with overlays, for display only
    pub rendered: Mat,
    /// Target box, present only when locked and visible this frame
    pub region: Option<TargetRegion>,
    pub phase: LockPhase,
}

/// Source of lock decisions
pub trait LockOracle {
    /// Process one frame
    ///
    /// # Errors
    ///
    /// Returns an error if detection or recognition fails on this frame.
    fn process(&mut self, frame: &Mat) -> Result<LockObservation>;

    /// Identity the oracle locks onto
    fn target_name(&self) -> &str;
}

/// A detected face with its recognition result
#[derive(Debug, Clone)]
pub struct RecognizedFace {
    pub region: TargetRegion,
    pub identity: Option<IdentityMatch>,
}

/// Pick the face to feed the lock this frame.
///
/// A face recognised as `target` wins (closest match first). While locked,
/// an unconfirmed face overlapping the last target box by at least
/// `track_iou` is accepted so brief recognition misses don't break the lock.
#[must_use]
pub fn select_target(
    faces: &[RecognizedFace],
    target: &str,
    phase: LockPhase,
    last_region: Option<&TargetRegion>,
    track_iou: f32,
) -> Option<TargetRegion> {
    let recognised = faces
        .iter()
        .filter_map(|face| {
            face.identity
                .as_ref()
                .filter(|m| m.name == target)
                .map(|m| (face.region, m.distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(region, _)| region);

    if recognised.is_some() || phase == LockPhase::Searching {
        return recognised;
    }

    let last = last_region?;
    faces
        .iter()
        .filter(|face| face.identity.as_ref().map_or(true, |m| m.name == target))
        .map(|face| (face.region, face.region.iou(last)))
        .filter(|(_, iou)| *iou >= track_iou)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(region, _)| region)
}

/// Face recognition based oracle
pub struct FaceLockOracle {
    target_name: String,
    detector: FaceDetector,
    embedder: FaceEmbedder,
    database: IdentityDatabase,
    lock: FaceLock,
    match_threshold: f32,
    track_iou: f32,
}

impl FaceLockOracle {
    /// Load the detector, embedder and identity database named in `config`.
    ///
    /// A target missing from the database is only a warning: the node runs
    /// but never locks.
    ///
    /// # Errors
    ///
    /// Returns an error if a model or the database cannot be loaded.
    pub fn new(config: &Config) -> Result<Self> {
        log::info!("Initializing face recognition");
        let detector = FaceDetector::new(&config.recognition.cascade_path, config.recognition.min_face_size)?;
        let embedder = FaceEmbedder::new(&config.recognition.embedder_model)?;
        let database = IdentityDatabase::load(&config.recognition.identity_db)?;

        Ok(Self::from_parts(
            &config.target.name,
            detector,
            embedder,
            database,
            config.recognition.match_threshold,
            &config.lock,
        ))
    }

    /// Assemble from already loaded components
    #[must_use]
    pub fn from_parts(
        target_name: &str,
        detector: FaceDetector,
        embedder: FaceEmbedder,
        database: IdentityDatabase,
        match_threshold: f32,
        lock: &LockConfig,
    ) -> Self {
        if !database.contains(target_name) {
            warn!(
                "Target '{}' not in database. Available: {:?}",
                target_name,
                database.names()
            );
        }
        Self {
            target_name: target_name.to_string(),
            detector,
            embedder,
            database,
            lock: FaceLock::from_config(lock),
            match_threshold,
            track_iou: lock.track_iou,
        }
    }

    fn recognize(&mut self, frame: &Mat) -> Result<Vec<RecognizedFace>> {
        let detections = self.detector.detect(frame)?;
        let mut faces = Vec::with_capacity(detections.len());
        for detection in detections {
            let crop = Mat::roi(frame, detection.bbox)?.try_clone()?;
            let embedding = self.embedder.embed(&crop)?;
            let identity = self.database.best_match(&embedding, self.match_threshold);
            debug!("Face at {:?} matched {:?}", detection.bbox, identity);
            faces.push(RecognizedFace {
                region: detection.region(),
                identity,
            });
        }
        Ok(faces)
    }

    fn render(&self, frame: &Mat, faces: &[RecognizedFace], observation_region: Option<&TargetRegion>) -> Result<Mat> {
        let mut rendered = frame.try_clone()?;

        for face in faces {
            let label = face
                .identity
                .as_ref()
                .map_or_else(|| "unknown".to_string(), |m| format!("{} {:.2}", m.name, m.distance));
            imgproc::rectangle(&mut rendered, face.region.to_rect(), Scalar::new(0.0, 255.0, 255.0, 0.0), 1, LINE_8, 0)?;
            let rect = face.region.to_rect();
            imgproc::put_text(
                &mut rendered,
                &label,
                Point::new(rect.x, (rect.y - 6).max(12)),
                FONT_HERSHEY_SIMPLEX,
                0.5,
                Scalar::new(0.0, 255.0, 255.0, 0.0),
                1,
                LINE_8,
                false,
            )?;
        }

        if let Some(region) = observation_region {
            imgproc::rectangle(&mut rendered, region.to_rect(), Scalar::new(0.0, 255.0, 0.0, 0.0), 3, LINE_8, 0)?;
        }

        let (banner, color) = match self.lock.phase() {
            LockPhase::Locked => (format!("LOCKED: {}", self.target_name), Scalar::new(0.0, 255.0, 0.0, 0.0)),
            LockPhase::Searching => ("SEARCHING".to_string(), Scalar::new(0.0, 0.0, 255.0, 0.0)),
        };
        imgproc::put_text(
            &mut rendered,
            &banner,
            Point::new(10, 30),
            FONT_HERSHEY_SIMPLEX,
            0.9,
            color,
            2,
            LINE_8,
            false,
        )?;

        Ok(rendered)
    }
}

impl LockOracle for FaceLockOracle {
    fn process(&mut self, frame: &Mat) -> Result<LockObservation> {
        let faces = self.recognize(frame)?;
        let candidate = select_target(
            &faces,
            &self.target_name,
            self.lock.phase(),
            self.lock.last_region(),
            self.track_iou,
        );
        let (phase, region) = self.lock.update(candidate);
        let rendered = self.render(frame, &faces, region.as_ref())?;

        Ok(LockObservation { rendered, region, phase })
    }

    fn target_name(&self) -> &str {
        &self.target_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, name: Option<(&str, f32)>) -> RecognizedFace {
        RecognizedFace {
            region: TargetRegion::new(x, 100.0, x + 80.0, 180.0),
            identity: name.map(|(n, d)| IdentityMatch {
                name: n.to_string(),
                distance: d,
            }),
        }
    }

    #[test]
    fn test_recognised_target_wins() {
        let faces = [face(0.0, Some(("beth", 0.1))), face(200.0, Some(("andrew", 0.3))), face(400.0, Some(("andrew", 0.2)))];
        let selected = select_target(&faces, "andrew", LockPhase::Searching, None, 0.3).unwrap();
        assert_eq!(selected.x1, 400.0);
    }

    #[test]
    fn test_searching_ignores_unrecognised_faces() {
        let faces = [face(0.0, None)];
        let last = faces[0].region;
        assert!(select_target(&faces, "andrew", LockPhase::Searching, Some(&last), 0.3).is_none());
    }

    #[test]
    fn test_locked_tracks_overlapping_unknown_face() {
        let last = TargetRegion::new(10.0, 100.0, 90.0, 180.0);
        let faces = [face(0.0, None), face(300.0, None)];
        let selected = select_target(&faces, "andrew", LockPhase::Locked, Some(&last), 0.3).unwrap();
        assert_eq!(selected.x1, 0.0);
    }

    #[test]
    fn test_locked_does_not_track_other_identity() {
        let last = TargetRegion::new(0.0, 100.0, 80.0, 180.0);
        let faces = [face(0.0, Some(("beth", 0.1)))];
        assert!(select_target(&faces, "andrew", LockPhase::Locked, Some(&last), 0.3).is_none());
    }

    #[test]
    fn test_locked_without_history_selects_nothing() {
        let faces = [face(0.0, None)];
        assert!(select_target(&faces, "andrew", LockPhase::Locked, None, 0.3).is_none());
    }
}
