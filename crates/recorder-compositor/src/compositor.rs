//! The per-tick compositor.

use image::RgbaImage;
use recorder_capture::VideoFrame;
use recorder_ipc::{CameraBackground, CompositionSettings, LayoutMode, PipStyle, Rgb, StreamKind};
use tracing::{trace, warn};

use crate::chroma::ChromaKeyFilter;
use crate::draw;
use crate::geometry::{centered_rect, pip_rect, Rect};
use crate::indicator;

/// Output size before any screen frame was seen.
pub const DEFAULT_SCREEN_OUTPUT: (u32, u32) = (1280, 720);

/// Output size of the camera-only layout before any camera frame was seen.
pub const DEFAULT_CAMERA_OUTPUT: (u32, u32) = (640, 480);

/// Camera width in the camera-big layout, as a fraction of the canvas.
const CAMERA_BIG_WIDTH: f32 = 0.6;

/// Brightness kept by the camera-big backdrop.
const BACKDROP_BRIGHTNESS: f32 = 0.5;

/// Shadow displacement, down and to the right.
const SHADOW_OFFSET: i32 = 4;

/// Recording state shown on the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingOverlay {
    /// Recorded time excluding pauses.
    pub elapsed_ms: u64,

    /// Paused recordings show a steady dot.
    pub paused: bool,
}

/// Why a tick drew less than its layout asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// The layout needs a source that was not supplied.
    Missing(StreamKind),

    /// The supplied frame does not match its declared dimensions.
    InvalidFrame(StreamKind),
}

/// One composited output frame.
#[derive(Debug, Clone)]
pub struct CompositeFrame {
    /// RGBA canvas.
    pub image: RgbaImage,

    /// Tick counter.
    pub sequence: u64,

    /// Layout drawn.
    pub layout: LayoutMode,

    /// Whether the recording indicator was drawn.
    pub recording: bool,

    /// Inputs that were skipped.
    pub degraded: Vec<Degradation>,
}

impl CompositeFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Tightly packed RGBA bytes.
    pub fn as_rgba(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// This frame scaled to exactly `width` x `height`.
    pub fn resized(&self, width: u32, height: u32) -> CompositeFrame {
        CompositeFrame {
            image: draw::scale_to(&self.image, width, height),
            sequence: self.sequence,
            layout: self.layout,
            recording: self.recording,
            degraded: self.degraded.clone(),
        }
    }
}

#[derive(PartialEq)]
struct ShadowKey {
    width: u32,
    height: u32,
    shape: recorder_ipc::PipShape,
}

/// Draws one of the layouts every tick.
pub struct Compositor {
    last_output: Option<(u32, u32)>,
    sequence: u64,
    shadow_cache: Option<(ShadowKey, RgbaImage)>,
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            last_output: None,
            sequence: 0,
            shadow_cache: None,
        }
    }

    /// Number of ticks run.
    pub fn ticks(&self) -> u64 {
        self.sequence
    }

    /// Output resolution for `layout` given the current source sizes.
    ///
    /// The screen defines the size of the screen layouts and the camera that
    /// of the camera-only layout. Without the defining source the previous
    /// output size is kept.
    pub fn output_size(
        &self,
        layout: LayoutMode,
        screen: Option<(u32, u32)>,
        camera: Option<(u32, u32)>,
    ) -> (u32, u32) {
        let defining = match layout {
            LayoutMode::CameraOnly => camera,
            LayoutMode::ScreenWithCameraPip | LayoutMode::CameraBig => screen,
        };
        let fallback = match layout {
            LayoutMode::CameraOnly => DEFAULT_CAMERA_OUTPUT,
            LayoutMode::ScreenWithCameraPip | LayoutMode::CameraBig => DEFAULT_SCREEN_OUTPUT,
        };
        defining.or(self.last_output).unwrap_or(fallback)
    }

    /// Composite one output frame. Never fails.
    pub fn tick(
        &mut self,
        screen: Option<&VideoFrame>,
        camera: Option<&VideoFrame>,
        settings: &CompositionSettings,
        overlay: Option<&RecordingOverlay>,
    ) -> CompositeFrame {
        let settings = settings.clamped();
        let mut degraded = Vec::new();

        let screen = decode(screen, StreamKind::Screen, &mut degraded);
        let mut camera = decode(camera, StreamKind::Camera, &mut degraded);
        if let Some(camera) = camera.as_mut() {
            ChromaKeyFilter::apply_in_place(camera, &settings.chroma_key);
        }

        let size = self.output_size(
            settings.layout,
            screen.as_ref().map(RgbaImage::dimensions),
            camera.as_ref().map(RgbaImage::dimensions),
        );
        self.last_output = Some(size);

        let mut canvas = RgbaImage::new(size.0, size.1);
        let opacity = settings.pip.effective_opacity(overlay.is_some());

        match settings.layout {
            LayoutMode::ScreenWithCameraPip => {
                match &screen {
                    Some(screen) => canvas = draw::scale_to(screen, size.0, size.1),
                    None => {
                        draw::fill(&mut canvas, Rgb::default());
                        note_missing(&mut degraded, StreamKind::Screen);
                    }
                }
                if let Some(camera) = &camera {
                    let rect = pip_rect(size, &settings.pip);
                    self.draw_camera(&mut canvas, camera, rect, &settings.pip, opacity);
                }
            }
            LayoutMode::CameraOnly => {
                match settings.camera_background {
                    CameraBackground::Blur => match &camera {
                        Some(camera) => canvas = draw::blurred_backdrop(camera, size.0, size.1),
                        None => draw::fill(&mut canvas, Rgb::default()),
                    },
                    CameraBackground::Color(color) => draw::fill(&mut canvas, color),
                    CameraBackground::Transparent => {}
                }
                match &camera {
                    Some(camera) => {
                        let rect = centered_rect(
                            size,
                            settings.camera_size_percent / 100.0,
                            aspect(camera),
                        );
                        self.draw_camera(&mut canvas, camera, rect, &settings.pip, opacity);
                    }
                    None => note_missing(&mut degraded, StreamKind::Camera),
                }
            }
            LayoutMode::CameraBig => {
                match &screen {
                    Some(screen) => {
                        canvas = draw::blurred_backdrop(screen, size.0, size.1);
                        draw::darken(&mut canvas, BACKDROP_BRIGHTNESS);
                    }
                    None => {
                        draw::fill(&mut canvas, Rgb::default());
                        note_missing(&mut degraded, StreamKind::Screen);
                    }
                }
                if let Some(camera) = &camera {
                    let rect = centered_rect(size, CAMERA_BIG_WIDTH, aspect(camera));
                    self.draw_camera(&mut canvas, camera, rect, &settings.pip, opacity);
                }
            }
        }

        if let Some(overlay) = overlay {
            indicator::draw(&mut canvas, overlay);
        }

        self.sequence += 1;
        trace!(
            sequence = self.sequence,
            width = size.0,
            height = size.1,
            degraded = degraded.len(),
            "Composited frame"
        );

        CompositeFrame {
            image: canvas,
            sequence: self.sequence,
            layout: settings.layout,
            recording: overlay.is_some(),
            degraded,
        }
    }

    fn draw_camera(
        &mut self,
        canvas: &mut RgbaImage,
        camera: &RgbaImage,
        rect: Rect,
        style: &PipStyle,
        opacity: f32,
    ) {
        if rect.is_empty() {
            return;
        }
        let scaled = draw::scale_to(camera, rect.width, rect.height);

        if style.shadow.enabled && style.shadow.intensity > 0.0 {
            let key = ShadowKey {
                width: rect.width,
                height: rect.height,
                shape: style.shape,
            };
            let cached = matches!(&self.shadow_cache, Some((cached, _)) if *cached == key);
            if !cached {
                let mask = draw::shadow_mask(rect.width, rect.height, style.shape);
                self.shadow_cache = Some((key, mask));
            }
            if let Some((_, mask)) = &self.shadow_cache {
                let shadow = rect
                    .inflate(draw::shadow_padding())
                    .offset(SHADOW_OFFSET, SHADOW_OFFSET);
                draw::draw_shadow(
                    canvas,
                    mask,
                    shadow.x,
                    shadow.y,
                    style.shadow.intensity * opacity,
                );
            }
        }

        draw::draw_shaped(canvas, &scaled, rect, style.shape, opacity);

        if style.border.enabled {
            draw::stroke_border(
                canvas,
                rect,
                style.shape,
                style.border.width_px,
                style.border.color,
            );
        }
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(
    frame: Option<&VideoFrame>,
    kind: StreamKind,
    degraded: &mut Vec<Degradation>,
) -> Option<RgbaImage> {
    let frame = frame?;
    if !frame.is_valid() {
        warn!(kind = kind.name(), width = frame.width, height = frame.height, "Invalid frame skipped");
        degraded.push(Degradation::InvalidFrame(kind));
        return None;
    }
    RgbaImage::from_raw(frame.width, frame.height, frame.data.to_vec())
}

fn note_missing(degraded: &mut Vec<Degradation>, kind: StreamKind) {
    if !degraded.contains(&Degradation::InvalidFrame(kind)) {
        degraded.push(Degradation::Missing(kind));
    }
}

fn aspect(image: &RgbaImage) -> f32 {
    image.height() as f32 / image.width().max(1) as f32
}
