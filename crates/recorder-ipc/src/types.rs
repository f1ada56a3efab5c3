//! Common types used across IPC messages.

use serde::{Deserialize, Serialize};

/// Kind of a capturable video source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A whole display.
    Screen,

    /// A single application window.
    Window,
}

/// A small RGBA preview of a capture source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thumbnail {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Tightly packed RGBA8 pixels.
    pub rgba: Vec<u8>,
}

/// A capture source (screen or window) as listed by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// Unique identifier, valid until the next catalog refresh.
    pub id: String,

    /// Display name for the UI.
    pub display_name: String,

    /// Type of capture source.
    pub kind: SourceKind,

    /// Optional preview image.
    pub thumbnail: Option<Thumbnail>,
}

/// Kind of an open media stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Screen or window video.
    Screen,

    /// Default camera video.
    Camera,

    /// Default microphone audio.
    Microphone,

    /// System audio loopback.
    SystemAudio,
}

impl StreamKind {
    /// Returns true for kinds that carry video.
    pub fn is_video(self) -> bool {
        matches!(self, Self::Screen | Self::Camera)
    }

    /// Returns the display name for this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Camera => "camera",
            Self::Microphone => "microphone",
            Self::SystemAudio => "system audio",
        }
    }
}

/// Media type of a single track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Kind of an input device reported by the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Camera,
    Microphone,
    SystemAudio,
}

/// An input device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Unique identifier for this device.
    pub id: String,

    /// Display name for the UI.
    pub name: String,

    /// Type of device.
    pub kind: DeviceKind,

    /// Whether this is the default device of its kind.
    pub is_default: bool,
}

/// Which optional inputs exist on this machine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceAvailability {
    pub camera: bool,
    pub microphone: bool,
    pub system_audio: bool,
}

/// Permission the host may have to ask the user for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    Screen,
    Camera,
    Microphone,
}

impl PermissionKind {
    /// Permission required to open a stream of the given kind, if any.
    pub fn for_stream(kind: StreamKind) -> Option<Self> {
        match kind {
            StreamKind::Screen => Some(Self::Screen),
            StreamKind::Camera => Some(Self::Camera),
            StreamKind::Microphone => Some(Self::Microphone),
            StreamKind::SystemAudio => None,
        }
    }
}

/// Host permission state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    #[default]
    NotDetermined,
    Restricted,
}

impl PermissionStatus {
    /// Returns true if access is granted.
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Host windows the engine toggles around a recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OverlayKind {
    /// Floating camera preview bubble.
    CameraPip,

    /// Recording toolbar.
    Toolbar,
}

/// An 8-bit RGB colour.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create a colour from components.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Format as `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Which compositor draw routine runs each tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LayoutMode {
    /// Screen at full size with a camera picture-in-picture.
    #[default]
    ScreenWithCameraPip,

    /// Camera only, on a configurable background.
    CameraOnly,

    /// Large centred camera over a blurred screen backdrop.
    CameraBig,
}

impl LayoutMode {
    /// Returns true if this layout cannot produce output without a screen.
    pub fn requires_screen(self) -> bool {
        matches!(self, Self::ScreenWithCameraPip | Self::CameraBig)
    }

    /// Returns true if this layout cannot produce output without a camera.
    pub fn requires_camera(self) -> bool {
        matches!(self, Self::CameraOnly)
    }
}

/// Clip shape of the camera region.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PipShape {
    Rectangle,
    #[default]
    Rounded,
    Circle,
}

/// Output corner for the camera PIP.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PipCorner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Where the camera PIP is anchored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum PipPosition {
    /// One of the four output corners, inset by a fixed margin.
    Corner(PipCorner),

    /// Percentage anchor (0-100 on each axis) within the free area.
    Custom { x_percent: f32, y_percent: f32 },
}

impl Default for PipPosition {
    fn default() -> Self {
        Self::Corner(PipCorner::default())
    }
}

/// Border drawn around the camera region.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PipBorder {
    pub enabled: bool,
    pub color: Rgb,
    pub width_px: u32,
}

impl Default for PipBorder {
    fn default() -> Self {
        Self {
            enabled: true,
            color: Rgb::new(0x66, 0x7e, 0xea),
            width_px: 3,
        }
    }
}

/// Drop shadow behind the camera region.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PipShadow {
    pub enabled: bool,

    /// Shadow strength (0.0 - 1.0).
    pub intensity: f32,
}

impl Default for PipShadow {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.5,
        }
    }
}

/// Camera PIP styling, read by the compositor every tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipStyle {
    pub shape: PipShape,
    pub position: PipPosition,

    /// PIP width as a percentage of output width (0-100).
    pub size_percent: f32,

    pub border: PipBorder,
    pub shadow: PipShadow,

    /// Opacity while previewing (0-100).
    pub opacity: f32,

    /// Opacity while recording (0-100); falls back to `opacity`.
    pub recording_opacity: Option<f32>,
}

impl Default for PipStyle {
    fn default() -> Self {
        Self {
            shape: PipShape::default(),
            position: PipPosition::default(),
            size_percent: 20.0,
            border: PipBorder::default(),
            shadow: PipShadow::default(),
            opacity: 100.0,
            recording_opacity: None,
        }
    }
}

impl PipStyle {
    /// Returns a copy with every numeric field forced into its valid range.
    pub fn clamped(mut self) -> Self {
        self.size_percent = clamp_percent(self.size_percent);
        self.opacity = clamp_percent(self.opacity);
        self.recording_opacity = self.recording_opacity.map(clamp_percent);
        self.shadow.intensity = if self.shadow.intensity.is_finite() {
            self.shadow.intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if let PipPosition::Custom {
            x_percent,
            y_percent,
        } = self.position
        {
            self.position = PipPosition::Custom {
                x_percent: clamp_percent(x_percent),
                y_percent: clamp_percent(y_percent),
            };
        }
        self
    }

    /// Opacity to use for the current recording state, as 0.0 - 1.0.
    pub fn effective_opacity(&self, recording: bool) -> f32 {
        let percent = if recording {
            self.recording_opacity.unwrap_or(self.opacity)
        } else {
            self.opacity
        };
        clamp_percent(percent) / 100.0
    }
}

fn clamp_percent(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Chroma-key (green screen) configuration for the camera.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChromaKeyConfig {
    pub enabled: bool,
    pub key_color: Rgb,

    /// Match tolerance (0.0 - 1.0).
    pub threshold: f32,
}

impl Default for ChromaKeyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key_color: Rgb::new(0, 255, 0),
            threshold: 0.4,
        }
    }
}

/// Background behind the camera in the camera-only layout.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraBackground {
    /// Blurred copy of the camera frame.
    #[default]
    Blur,

    /// Flat colour fill.
    Color(Rgb),

    /// Leave the canvas transparent.
    Transparent,
}

/// Everything the compositor reads each tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompositionSettings {
    pub layout: LayoutMode,
    pub pip: PipStyle,
    pub chroma_key: ChromaKeyConfig,
    pub camera_background: CameraBackground,

    /// Camera size in the camera-only layout, percent of the canvas.
    pub camera_size_percent: f32,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            layout: LayoutMode::default(),
            pip: PipStyle::default(),
            chroma_key: ChromaKeyConfig::default(),
            camera_background: CameraBackground::default(),
            camera_size_percent: 80.0,
        }
    }
}

impl CompositionSettings {
    /// Returns a copy with every numeric field forced into its valid range.
    pub fn clamped(mut self) -> Self {
        self.pip = self.pip.clamped();
        self.camera_size_percent = clamp_percent(self.camera_size_percent);
        self.chroma_key.threshold = if self.chroma_key.threshold.is_finite() {
            self.chroma_key.threshold.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

/// A finished recording handed to the file-save collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalizedRecording {
    /// Concatenated container bytes.
    pub bytes: Vec<u8>,

    /// Negotiated MIME type.
    pub mime_type: String,

    /// Recorded duration excluding paused spans.
    pub duration_ms: u64,

    /// File extension matching the container (without the dot).
    pub file_extension: String,

    /// Mixed audio, stored beside the container when it has no audio stream.
    pub audio: Option<RecordedAudio>,
}

/// Mixed microphone and system audio of one recording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedAudio {
    /// Encoded audio file.
    pub bytes: Vec<u8>,

    pub mime_type: String,

    /// File extension (without the dot).
    pub file_extension: String,

    /// Audio length; paused spans are not recorded.
    pub duration_ms: u64,
}

/// Real-time recording metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingMetrics {
    /// Composited frames per second over the last report window.
    pub fps: f32,

    /// Target frames per second.
    pub target_fps: f32,

    /// Frames composed since the engine started.
    pub frames_composed: u64,

    /// Frames handed to the encoder.
    pub frames_encoded: u64,

    /// Ticks that reused the previous source frame.
    pub frames_duplicated: u64,

    /// Ticks where a source was missing or invalid.
    pub degraded_ticks: u64,

    /// Encoded bytes received so far.
    pub bytes_recorded: u64,

    /// Recording time excluding pauses.
    pub elapsed_ms: u64,
}

/// Types of performance warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WarningType {
    /// A compositor tick took longer than the frame interval.
    SlowComposition { tick_ms: f32, budget_ms: f32 },

    /// A source has stopped delivering frames.
    SourceEnded { kind: StreamKind },
}
