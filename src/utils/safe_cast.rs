//! Checked numeric conversions for pixel coordinates and tensor shapes

use crate::{Error, Result};

/// Safely convert i32 to usize, rejecting negatives
///
/// # Errors
///
/// Returns an error if the value is negative
pub fn i32_to_usize(value: i32) -> Result<usize> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} cannot be used as a size")))
}

/// Clamp and convert f32 to i32 for pixel coordinates
///
/// Non-finite input maps to `min`; fractions truncate toward zero.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Acceptable for clamping bounds
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f32_to_i32_clamp(value: f32, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.clamp(min as f32, max as f32);
    (clamped as i32).clamp(min, max)
}
