//! Real-time compositing of screen and camera frames.
//!
//! [`Compositor::tick`] runs once per output frame. It draws one of the
//! [`LayoutMode`](recorder_ipc::LayoutMode) routines onto an RGBA canvas,
//! optionally keying the camera through [`ChromaKeyFilter`], and burns the
//! recording indicator in while a recording is active. A tick never fails:
//! missing or malformed inputs are skipped and listed in
//! [`CompositeFrame::degraded`].

mod chroma;
mod compositor;
mod draw;
mod geometry;
mod indicator;
mod mask;

pub use chroma::ChromaKeyFilter;
pub use compositor::{
    CompositeFrame, Compositor, Degradation, RecordingOverlay, DEFAULT_CAMERA_OUTPUT,
    DEFAULT_SCREEN_OUTPUT,
};
pub use geometry::{centered_rect, pip_rect, Rect, PIP_ASPECT, PIP_MARGIN};
pub use indicator::{format_elapsed, format_elapsed_long};
pub use mask::ROUNDED_RADIUS;
