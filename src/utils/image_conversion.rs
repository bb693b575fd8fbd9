//! Conversions between `OpenCV` images and ndarray tensors for the embedder.

use crate::utils::safe_cast::i32_to_usize;
use crate::{Error, Result};
use ndarray::{Array3, Array4};
use opencv::core::{Mat, Vec3f, CV_32FC3};
use opencv::prelude::*;

/// Copy a `CV_32FC3` image into an HWC array
///
/// # Errors
/// * Returns error if the Mat is empty or not `CV_32FC3`
pub fn mat_to_array3_f32(mat: &Mat) -> Result<Array3<f32>> {
    if mat.typ() != CV_32FC3 {
        return Err(Error::InvalidInput(format!(
            "Expected CV_32FC3 image, got type {}",
            mat.typ()
        )));
    }
    let rows = i32_to_usize(mat.rows())?;
    let cols = i32_to_usize(mat.cols())?;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidInput(format!("Invalid Mat dimensions: {rows}x{cols}")));
    }

    // ROI views are not continuous, so walk rows instead of taking one slice
    let mut data = Vec::with_capacity(rows * cols * 3);
    for row in 0..mat.rows() {
        for col in 0..mat.cols() {
            let pixel = mat.at_2d::<Vec3f>(row, col)?;
            data.extend_from_slice(&[pixel[0], pixel[1], pixel[2]]);
        }
    }

    Array3::from_shape_vec((rows, cols, 3), data)
        .map_err(|e| Error::InvalidInput(format!("Failed to create array from Mat: {e}")))
}

/// Convert a `CV_32FC3` image into a single-image NCHW batch
///
/// # Errors
/// * Returns error if the Mat cannot be read as `CV_32FC3`
pub fn mat_to_nchw(mat: &Mat) -> Result<Array4<f32>> {
    let hwc = mat_to_array3_f32(mat)?;
    let chw = hwc.permuted_axes([2, 0, 1]);
    Ok(chw.insert_axis(ndarray::Axis(0)).as_standard_layout().to_owned())
}
