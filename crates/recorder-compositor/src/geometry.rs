//! Placement of the camera region on the canvas.

use recorder_ipc::{PipCorner, PipPosition, PipStyle};

/// Inset of corner-anchored PIPs from the canvas edge, in pixels.
pub const PIP_MARGIN: u32 = 10;

/// PIP height / width.
pub const PIP_ASPECT: f32 = 3.0 / 4.0;

/// An axis-aligned rectangle. The origin may lie off-canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Grow by `amount` on every side.
    pub fn inflate(&self, amount: u32) -> Self {
        Self {
            x: self.x - amount as i32,
            y: self.y - amount as i32,
            width: self.width + amount * 2,
            height: self.height + amount * 2,
        }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// PIP rectangle for a canvas of `canvas` size.
///
/// Width is `size_percent` of the canvas width and the height follows the
/// fixed 4:3 aspect. Corner positions keep [`PIP_MARGIN`] from both edges; a
/// custom position maps each percentage onto the space left free by the PIP.
pub fn pip_rect(canvas: (u32, u32), style: &PipStyle) -> Rect {
    let (canvas_w, canvas_h) = canvas;
    let width = (canvas_w as f32 * style.size_percent.clamp(0.0, 100.0) / 100.0).round() as u32;
    let height = (width as f32 * PIP_ASPECT).round() as u32;

    let margin = PIP_MARGIN as i32;
    let far_x = canvas_w as i32 - width as i32 - margin;
    let far_y = canvas_h as i32 - height as i32 - margin;

    let (x, y) = match style.position {
        PipPosition::Corner(PipCorner::TopLeft) => (margin, margin),
        PipPosition::Corner(PipCorner::TopRight) => (far_x, margin),
        PipPosition::Corner(PipCorner::BottomLeft) => (margin, far_y),
        PipPosition::Corner(PipCorner::BottomRight) => (far_x, far_y),
        PipPosition::Custom {
            x_percent,
            y_percent,
        } => {
            let free_w = canvas_w.saturating_sub(width) as f32;
            let free_h = canvas_h.saturating_sub(height) as f32;
            (
                (free_w * x_percent.clamp(0.0, 100.0) / 100.0).round() as i32,
                (free_h * y_percent.clamp(0.0, 100.0) / 100.0).round() as i32,
            )
        }
    };

    Rect::new(x, y, width, height)
}

/// A rectangle `width_fraction` of the canvas width, with `aspect`
/// (height / width), centred on the canvas.
pub fn centered_rect(canvas: (u32, u32), width_fraction: f32, aspect: f32) -> Rect {
    let (canvas_w, canvas_h) = canvas;
    let width = (canvas_w as f32 * width_fraction.clamp(0.0, 1.0)).round() as u32;
    let height = (width as f32 * aspect.max(0.0)).round() as u32;
    let x = (canvas_w as i32 - width as i32) / 2;
    let y = (canvas_h as i32 - height as i32) / 2;
    Rect::new(x, y, width, height)
}
