//! The platform capture seam.

use crossbeam_channel::Receiver;
use recorder_audio::AudioChunk;
use recorder_ipc::{DeviceInfo, PermissionKind, PermissionStatus, Source, StreamKind, TrackKind};

use crate::frame::VideoFrame;
use crate::CaptureResult;

/// What to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub kind: StreamKind,

    /// Screen/window id. Ignored for device kinds, which use the default device.
    pub source_id: Option<String>,
}

/// A track as reported by the host when a stream opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSpec {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
}

/// Running device behind an open stream.
pub trait MediaDevice: Send {
    /// Stop producing media and release the device.
    fn stop(&mut self);
}

/// A stream freshly opened by the host.
pub struct OpenedStream {
    /// Tracks in host order. Fixed for the life of the stream.
    pub tracks: Vec<TrackSpec>,

    /// RGBA frames, for video kinds.
    pub video: Option<Receiver<VideoFrame>>,

    /// Interleaved f32 stereo chunks, for audio kinds.
    pub audio: Option<Receiver<AudioChunk>>,

    /// Device control.
    pub device: Box<dyn MediaDevice>,
}

/// Platform capture services.
pub trait CaptureHost: Send + Sync {
    /// List capturable screens and windows.
    fn list_capture_sources(&self) -> CaptureResult<Vec<Source>>;

    /// List cameras and audio inputs.
    fn list_devices(&self) -> CaptureResult<Vec<DeviceInfo>>;

    /// Current permission state.
    fn permission_status(&self, kind: PermissionKind) -> PermissionStatus;

    /// Ask the user for a permission. May block until they answer.
    fn request_permission(&self, kind: PermissionKind) -> bool;

    /// Open a media stream.
    fn open_media_stream(&self, request: &StreamRequest) -> CaptureResult<OpenedStream>;
}
