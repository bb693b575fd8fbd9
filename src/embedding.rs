use crate::constants::{EMBEDDER_INPUT_SIZE, EPSILON, IMAGE_NORMALIZATION_OFFSET, IMAGE_NORMALIZATION_SCALE};
use crate::utils::image_conversion::mat_to_nchw;
use crate::{Error, Result};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, CV_32FC3};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Scale a vector to unit length in place; zero vectors are left untouched
pub fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > EPSILON {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

/// Face embedding extractor using an ArcFace-style `ONNX` model
pub struct FaceEmbedder {
    session: Session,
    input_size: i32,
}

impl FaceEmbedder {
    /// Create a new embedder from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The model file does not exist or cannot be loaded
    /// - The `ONNX` runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();
        log::info!("Initializing FaceEmbedder with model: {}", path.display());
        if !path.exists() {
            return Err(Error::ModelError(format!("Embedding model not found: {}", path.display())));
        }

        let environment = Arc::new(
            Environment::builder()
                .with_name("face_embedder")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelError("Model has no inputs".to_string()));
        }

        Ok(Self {
            session,
            input_size: EMBEDDER_INPUT_SIZE,
        })
    }

    /// Compute a unit-length embedding for a BGR face crop
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails, or the model
    /// produces an empty output.
    pub fn embed(&self, face_image: &Mat) -> Result<Vec<f32>> {
        let input = self.preprocess(face_image)?;
        let mut embedding = self.forward(input)?;
        if embedding.is_empty() {
            return Err(Error::ModelOutputError("Empty embedding".to_string()));
        }
        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    /// Resize, convert to RGB and normalize into an NCHW batch of one
    fn preprocess(&self, image: &Mat) -> Result<Array4<f32>> {
        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb_image = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(
            &mut float_image,
            CV_32FC3,
            1.0 / f64::from(IMAGE_NORMALIZATION_SCALE),
            -f64::from(IMAGE_NORMALIZATION_OFFSET) / f64::from(IMAGE_NORMALIZATION_SCALE),
        )?;

        mat_to_nchw(&float_image)
    }

    /// Run forward pass through the model
    fn forward(&self, inputs: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelOutputError("No output from model".to_string()))?;

        let tensor = output.try_extract::<f32>()?;
        let view = tensor.view();
        Ok(view.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_missing_model_is_model_error() {
        assert!(matches!(FaceEmbedder::new("missing/model.onnx"), Err(Error::ModelError(_))));
    }

    #[test]
    #[ignore = "Requires the ArcFace ONNX model"]
    fn test_embedding_is_unit_length() {
        let embedder = FaceEmbedder::new("assets/embedder_arcface.onnx").unwrap();
        let face = Mat::new_rows_cols_with_default(
            150,
            120,
            opencv::core::CV_8UC3,
            opencv::core::Scalar::all(128.0),
        )
        .unwrap();
        let embedding = embedder.embed(&face).unwrap();
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}
