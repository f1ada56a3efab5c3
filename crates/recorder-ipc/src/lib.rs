//! Typed host<->engine messages for the recorder.
//!
//! This crate defines the data model shared by every other crate in the
//! workspace: capture sources, composition settings, the recording state
//! machine, the error taxonomy, and the command/event messages exchanged
//! between a host application and the engine thread.

mod commands;
mod error;
mod events;
mod settings;
mod state;
mod types;

pub use commands::RecorderCommand;
pub use error::ErrorKind;
pub use events::RecorderEvent;
pub use settings::{
    RecorderSettings, RecordingConfig, DEFAULT_FPS, DEFAULT_TIMESLICE_MS,
    DEFAULT_VIDEO_BITS_PER_SECOND, SETTINGS_VERSION,
};
pub use state::{RecordingState, ShutdownPhase, StartupPhase, StopReason};
pub use types::{
    CameraBackground, ChromaKeyConfig, CompositionSettings, DeviceAvailability, DeviceInfo,
    DeviceKind, FinalizedRecording, LayoutMode, OverlayKind, PermissionKind, PermissionStatus,
    PipBorder, PipCorner, PipPosition, PipShadow, PipShape, PipStyle, RecordedAudio,
    RecordingMetrics, Rgb, Source, SourceKind, StreamKind, Thumbnail, TrackKind, WarningType,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (host → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (engine → host).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<RecorderCommand>, Receiver<RecorderCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<RecorderEvent>, Receiver<RecorderEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
