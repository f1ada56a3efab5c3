//! A capture host that synthesizes media.
//!
//! Screens get a moving gradient, the camera a flat colour, and audio
//! inputs a sine tone. Permissions, device presence and open failures can
//! be scripted, which is what the engine tests drive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use recorder_audio::{AudioChunk, ToneGenerator, AUDIO_CHANNEL_CAPACITY};
use recorder_ipc::{
    DeviceInfo, DeviceKind, PermissionKind, PermissionStatus, Rgb, Source, SourceKind, StreamKind,
    Thumbnail, TrackKind,
};
use tracing::{debug, trace};

use crate::error::CaptureError;
use crate::frame::{CaptureTimestamp, VideoFrame};
use crate::host::{CaptureHost, MediaDevice, OpenedStream, StreamRequest, TrackSpec};
use crate::{CaptureResult, FRAME_CHANNEL_CAPACITY};

const THUMBNAIL_SIZE: (u32, u32) = (32, 18);

/// What the synthetic host offers.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub sources: Vec<Source>,
    pub screen_size: (u32, u32),
    pub camera_size: (u32, u32),
    pub fps: u32,
    pub camera_color: Rgb,
    pub has_camera: bool,
    pub has_microphone: bool,
    pub has_system_audio: bool,
    pub tone_hz: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                Source {
                    id: "screen:0".into(),
                    display_name: "Display 1".into(),
                    kind: SourceKind::Screen,
                    thumbnail: Some(screen_thumbnail()),
                },
                Source {
                    id: "window:1".into(),
                    display_name: "Synthetic Window".into(),
                    kind: SourceKind::Window,
                    thumbnail: None,
                },
            ],
            screen_size: (1280, 720),
            camera_size: (640, 480),
            fps: 30,
            camera_color: Rgb::new(70, 90, 160),
            has_camera: true,
            has_microphone: true,
            has_system_audio: true,
            tone_hz: 440.0,
        }
    }
}

impl SyntheticConfig {
    /// Small frame sizes for fast tests.
    pub fn small() -> Self {
        Self {
            screen_size: (320, 180),
            camera_size: (160, 120),
            ..Self::default()
        }
    }
}

/// Scriptable in-process [`CaptureHost`].
pub struct SyntheticHost {
    config: SyntheticConfig,
    permissions: RwLock<HashMap<PermissionKind, PermissionStatus>>,
    responses: RwLock<HashMap<PermissionKind, bool>>,
    failures: RwLock<HashMap<StreamKind, String>>,
    deny_enumeration: AtomicBool,
    producers: Mutex<HashMap<StreamKind, Arc<AtomicBool>>>,
    active: Arc<AtomicUsize>,
    permission_requests: AtomicUsize,
    opens: AtomicUsize,
}

impl SyntheticHost {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            permissions: RwLock::new(HashMap::new()),
            responses: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            deny_enumeration: AtomicBool::new(false),
            producers: Mutex::new(HashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
            permission_requests: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Set a permission status. Unset permissions are granted.
    pub fn set_permission(&self, kind: PermissionKind, status: PermissionStatus) {
        self.permissions.write().insert(kind, status);
    }

    /// Answer future permission prompts for `kind`. Defaults to granting.
    pub fn set_permission_response(&self, kind: PermissionKind, grant: bool) {
        self.responses.write().insert(kind, grant);
    }

    /// Make every open of `kind` fail with the given device error name.
    pub fn fail_open(&self, kind: StreamKind, error_name: &str) {
        self.failures.write().insert(kind, error_name.to_string());
    }

    /// Remove an injected open failure.
    pub fn clear_failure(&self, kind: StreamKind) {
        self.failures.write().remove(&kind);
    }

    /// Refuse source enumeration.
    pub fn deny_enumeration(&self, deny: bool) {
        self.deny_enumeration.store(deny, Ordering::SeqCst);
    }

    /// Stop the producer of `kind` as if the device went away.
    pub fn end_stream(&self, kind: StreamKind) {
        if let Some(stop) = self.producers.lock().get(&kind) {
            stop.store(true, Ordering::SeqCst);
        }
    }

    /// Streams opened and not yet stopped.
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of permission prompts shown.
    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    /// Number of successful opens.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn has_device(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Screen => true,
            StreamKind::Camera => self.config.has_camera,
            StreamKind::Microphone => self.config.has_microphone,
            StreamKind::SystemAudio => self.config.has_system_audio,
        }
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.fps.max(1) as f64)
    }
}

impl CaptureHost for SyntheticHost {
    fn list_capture_sources(&self) -> CaptureResult<Vec<Source>> {
        if self.deny_enumeration.load(Ordering::SeqCst) {
            return Err(CaptureError::Unavailable(
                "source enumeration denied".into(),
            ));
        }
        Ok(self.config.sources.clone())
    }

    fn list_devices(&self) -> CaptureResult<Vec<DeviceInfo>> {
        let mut devices = Vec::new();
        let mut push = |present: bool, id: &str, name: &str, kind: DeviceKind| {
            if present {
                devices.push(DeviceInfo {
                    id: id.into(),
                    name: name.into(),
                    kind,
                    is_default: true,
                });
            }
        };
        push(self.config.has_camera, "camera:0", "Synthetic Camera", DeviceKind::Camera);
        push(
            self.config.has_microphone,
            "mic:0",
            "Synthetic Microphone",
            DeviceKind::Microphone,
        );
        push(
            self.config.has_system_audio,
            "loopback:0",
            "System Audio",
            DeviceKind::SystemAudio,
        );
        Ok(devices)
    }

    fn permission_status(&self, kind: PermissionKind) -> PermissionStatus {
        self.permissions
            .read()
            .get(&kind)
            .copied()
            .unwrap_or(PermissionStatus::Granted)
    }

    fn request_permission(&self, kind: PermissionKind) -> bool {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        let grant = self.responses.read().get(&kind).copied().unwrap_or(true);
        let status = if grant {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        self.permissions.write().insert(kind, status);
        grant
    }

    fn open_media_stream(&self, request: &StreamRequest) -> CaptureResult<OpenedStream> {
        let kind = request.kind;
        if let Some(name) = self.failures.read().get(&kind) {
            return Err(CaptureError::device(kind, name.clone(), "injected failure"));
        }
        if !self.has_device(kind) {
            return Err(CaptureError::device(kind, "NotFoundError", "no such device"));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (tracks, video, audio, thread) = match kind {
            StreamKind::Screen | StreamKind::Camera => {
                let (label, pattern) = if kind == StreamKind::Screen {
                    let id = request.source_id.clone().unwrap_or_default();
                    let source = self
                        .config
                        .sources
                        .iter()
                        .find(|s| s.id == id)
                        .ok_or_else(|| CaptureError::SourceNotFound(id.clone()))?;
                    (
                        source.display_name.clone(),
                        Pattern::Gradient {
                            width: self.config.screen_size.0,
                            height: self.config.screen_size.1,
                        },
                    )
                } else {
                    (
                        "Synthetic Camera".to_string(),
                        Pattern::Solid {
                            width: self.config.camera_size.0,
                            height: self.config.camera_size.1,
                            color: self.config.camera_color,
                        },
                    )
                };
                let (tx, rx) = crossbeam_channel::bounded(FRAME_CHANNEL_CAPACITY);
                let interval = self.frame_interval();
                let stop_flag = Arc::clone(&stop);
                let thread = thread::Builder::new()
                    .name(format!("synthetic-{}", kind.name()))
                    .spawn(move || video_producer(pattern, interval, tx, stop_flag))
                    .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
                let track = TrackSpec {
                    id: format!("{}-video", kind.name()),
                    kind: TrackKind::Video,
                    label,
                };
                (vec![track], Some(rx), None, thread)
            }
            StreamKind::Microphone | StreamKind::SystemAudio => {
                let hz = if kind == StreamKind::Microphone {
                    self.config.tone_hz
                } else {
                    self.config.tone_hz * 1.5
                };
                let (tx, rx) = crossbeam_channel::bounded(AUDIO_CHANNEL_CAPACITY);
                let stop_flag = Arc::clone(&stop);
                let thread = thread::Builder::new()
                    .name(format!("synthetic-{}", kind.name()))
                    .spawn(move || audio_producer(ToneGenerator::new(hz, 0.3), tx, stop_flag))
                    .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
                let track = TrackSpec {
                    id: format!("{}-audio", kind.name()),
                    kind: TrackKind::Audio,
                    label: kind.name().to_string(),
                };
                (vec![track], None, Some(rx), thread)
            }
        };

        self.producers.lock().insert(kind, Arc::clone(&stop));
        self.active.fetch_add(1, Ordering::SeqCst);
        self.opens.fetch_add(1, Ordering::SeqCst);
        debug!(kind = kind.name(), "Synthetic stream opened");

        Ok(OpenedStream {
            tracks,
            video,
            audio,
            device: Box::new(SyntheticDevice {
                stop,
                thread: Some(thread),
                active: Arc::clone(&self.active),
            }),
        })
    }
}

struct SyntheticDevice {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
}

impl MediaDevice for SyntheticDevice {
    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop.store(true, Ordering::SeqCst);
            let _ = thread.join();
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Gradient { width: u32, height: u32 },
    Solid { width: u32, height: u32, color: Rgb },
}

impl Pattern {
    fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Gradient { width, height } | Self::Solid { width, height, .. } => {
                (width, height)
            }
        }
    }

    fn render(self, sequence: u64) -> Vec<u8> {
        let (width, height) = self.dimensions();
        let mut data = Vec::with_capacity(VideoFrame::rgba_buffer_size(width, height));
        match self {
            Self::Gradient { .. } => {
                let bar = (sequence * 4 % width.max(1) as u64) as u32;
                for y in 0..height {
                    for x in 0..width {
                        if x.abs_diff(bar) < 4 {
                            data.extend_from_slice(&[255, 255, 255, 255]);
                        } else {
                            let r = (x * 255 / width.max(1)) as u8;
                            let g = (y * 255 / height.max(1)) as u8;
                            data.extend_from_slice(&[r, g, 128, 255]);
                        }
                    }
                }
            }
            Self::Solid { color, .. } => {
                for _ in 0..width * height {
                    data.extend_from_slice(&[color.r, color.g, color.b, 255]);
                }
            }
        }
        data
    }
}

fn video_producer(
    pattern: Pattern,
    interval: Duration,
    sender: Sender<VideoFrame>,
    stop: Arc<AtomicBool>,
) {
    let start = Instant::now();
    let (width, height) = pattern.dimensions();
    let mut sequence = 0u64;
    let mut next = start;

    while !stop.load(Ordering::SeqCst) {
        let frame = VideoFrame::new(
            Bytes::from(pattern.render(sequence)),
            width,
            height,
            CaptureTimestamp::now(start),
            sequence,
        );
        match sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("Frame channel full, dropping frame"),
            Err(TrySendError::Disconnected(_)) => break,
        }
        sequence += 1;
        next += interval;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        }
    }
}

fn audio_producer(mut tone: ToneGenerator, sender: Sender<AudioChunk>, stop: Arc<AtomicBool>) {
    let interval = Duration::from_millis(10);
    let mut next = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        match sender.try_send(tone.next_chunk()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("Audio channel full, dropping chunk"),
            Err(TrySendError::Disconnected(_)) => break,
        }
        next += interval;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        }
    }
}

fn screen_thumbnail() -> Thumbnail {
    let (width, height) = THUMBNAIL_SIZE;
    Thumbnail {
        width,
        height,
        rgba: Pattern::Gradient { width, height }.render(0),
    }
}
