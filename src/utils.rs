//! Utility functions for image processing and coordinate transformations.

pub mod image_conversion;
pub mod safe_cast;

use crate::types::TargetRegion;
use opencv::core::Rect;
use safe_cast::f32_to_i32_clamp;

/// Expand a region by `pad` pixels on every side and clamp it to the frame.
///
/// Corners are truncated to whole pixels before padding. The result may have
/// zero width or height when the region lies outside the frame.
#[must_use]
pub fn expand_box(region: &TargetRegion, pad: i32, max_width: i32, max_height: i32) -> Rect {
    let x1 = (f32_to_i32_clamp(region.x1, 0, max_width) - pad).max(0);
    let y1 = (f32_to_i32_clamp(region.y1, 0, max_height) - pad).max(0);
    let x2 = (f32_to_i32_clamp(region.x2, 0, max_width) + pad).min(max_width);
    let y2 = (f32_to_i32_clamp(region.y2, 0, max_height) + pad).min(max_height);

    Rect::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_box_interior() {
        let region = TargetRegion::new(100.0, 100.0, 200.0, 220.0);
        let rect = expand_box(&region, 20, 640, 480);
        assert_eq!(rect, Rect::new(80, 80, 140, 160));
    }

    #[test]
    fn test_expand_box_truncates_fractions() {
        let region = TargetRegion::new(100.9, 50.5, 150.2, 99.9);
        let rect = expand_box(&region, 20, 640, 480);
        assert_eq!(rect, Rect::new(80, 30, 90, 89));
    }

    #[test]
    fn test_expand_box_edge_boundaries() {
        let boxes = [
            TargetRegion::new(0.0, 0.0, 10.0, 10.0),
            TargetRegion::new(630.0, 470.0, 640.0, 480.0),
            TargetRegion::new(-50.0, -50.0, 700.0, 500.0),
        ];

        for region in &boxes {
            let rect = expand_box(region, 20, 640, 480);
            assert!(rect.x >= 0);
            assert!(rect.y >= 0);
            assert!(rect.x + rect.width <= 640);
            assert!(rect.y + rect.height <= 480);
        }
        assert_eq!(expand_box(&boxes[0], 20, 640, 480), Rect::new(0, 0, 30, 30));
        assert_eq!(expand_box(&boxes[2], 20, 640, 480), Rect::new(0, 0, 640, 480));
    }

    #[test]
    fn test_expand_box_outside_frame_is_empty() {
        let region = TargetRegion::new(900.0, 900.0, 950.0, 950.0);
        let rect = expand_box(&region, 0, 640, 480);
        assert_eq!(rect.width, 0);
        assert_eq!(rect.height, 0);
    }
}
