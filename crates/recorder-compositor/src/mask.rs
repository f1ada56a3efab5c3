//! Clip shapes for the camera region.

use recorder_ipc::PipShape;

/// Corner radius of the rounded shape, in pixels.
pub const ROUNDED_RADIUS: f32 = 16.0;

/// Signed distance from `(px, py)` to the edge of `shape` laid out in a
/// `width` x `height` box at the origin. Negative inside.
pub fn signed_distance(shape: PipShape, width: f32, height: f32, px: f32, py: f32) -> f32 {
    let cx = width / 2.0;
    let cy = height / 2.0;
    let dx = (px - cx).abs();
    let dy = (py - cy).abs();

    match shape {
        PipShape::Circle => {
            let radius = width.min(height) / 2.0;
            (dx * dx + dy * dy).sqrt() - radius
        }
        PipShape::Rectangle | PipShape::Rounded => {
            let radius = if shape == PipShape::Rounded {
                ROUNDED_RADIUS.min(cx).min(cy)
            } else {
                0.0
            };
            let qx = dx - cx + radius;
            let qy = dy - cy + radius;
            let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
            outside + qx.max(qy).min(0.0) - radius
        }
    }
}

/// Fraction (0.0 - 1.0) of pixel `(x, y)` covered by `shape`.
pub fn coverage(shape: PipShape, width: u32, height: u32, x: u32, y: u32) -> f32 {
    let d = signed_distance(
        shape,
        width as f32,
        height as f32,
        x as f32 + 0.5,
        y as f32 + 0.5,
    );
    (0.5 - d).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_covers_every_pixel() {
        for (x, y) in [(0, 0), (9, 0), (0, 9), (9, 9), (5, 5)] {
            assert_eq!(coverage(PipShape::Rectangle, 10, 10, x, y), 1.0);
        }
    }

    #[test]
    fn test_rounded_clips_corners_only() {
        assert_eq!(coverage(PipShape::Rounded, 100, 100, 0, 0), 0.0);
        assert_eq!(coverage(PipShape::Rounded, 100, 100, 50, 0), 1.0);
        assert_eq!(coverage(PipShape::Rounded, 100, 100, 50, 50), 1.0);
    }

    #[test]
    fn test_circle_is_inscribed() {
        assert_eq!(coverage(PipShape::Circle, 100, 60, 50, 30), 1.0);
        assert_eq!(coverage(PipShape::Circle, 100, 60, 5, 30), 0.0);
        assert_eq!(coverage(PipShape::Circle, 100, 60, 78, 30), 1.0);
    }

    #[test]
    fn test_distance_sign() {
        assert!(signed_distance(PipShape::Rectangle, 10.0, 10.0, 5.0, 5.0) < 0.0);
        assert!(signed_distance(PipShape::Rectangle, 10.0, 10.0, 12.0, 5.0) > 0.0);
    }
}
