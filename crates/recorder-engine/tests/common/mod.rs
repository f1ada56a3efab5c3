#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use recorder_capture::{StreamAcquirer, StreamHandle, SyntheticConfig, SyntheticHost, VideoFrame};
use recorder_encoder::{
    EncoderBackend, EncoderConfig, EncoderError, EncoderResult, EncoderTracks, MediaEncoder,
    RawVideoBackend,
};
use recorder_engine::{RecordingSession, UiHost};
use recorder_ipc::{OverlayKind, RecorderEvent, RecordingConfig};

/// Records every call it receives.
#[derive(Default)]
pub struct RecordingUi {
    notifications: Mutex<Vec<String>>,
    overlays: Mutex<Vec<(OverlayKind, bool)>>,
}

impl RecordingUi {
    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().clone()
    }

    pub fn overlays(&self) -> Vec<(OverlayKind, bool)> {
        self.overlays.lock().clone()
    }
}

impl UiHost for RecordingUi {
    fn show_overlay_window(&self, kind: OverlayKind, visible: bool) {
        self.overlays.lock().push((kind, visible));
    }

    fn show_transient_notification(&self, message: &str, _duration: Duration) {
        self.notifications.lock().push(message.to_string());
    }
}

/// A backend without a single usable container.
pub struct NoCodecs;

impl EncoderBackend for NoCodecs {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_type_supported(&self, _mime: &str) -> bool {
        false
    }

    fn create(
        &self,
        _config: &EncoderConfig,
        _tracks: &EncoderTracks,
    ) -> EncoderResult<Box<dyn MediaEncoder>> {
        Err(EncoderError::Unsupported { tried: 0 })
    }
}

pub struct Fixture {
    pub host: Arc<SyntheticHost>,
    pub acquirer: Arc<StreamAcquirer>,
    pub ui: Arc<RecordingUi>,
    pub events: Receiver<RecorderEvent>,
    pub session: RecordingSession,
}

pub fn fixture() -> Fixture {
    fixture_with(Arc::new(RawVideoBackend::new()))
}

pub fn fixture_with(backend: Arc<dyn EncoderBackend>) -> Fixture {
    let host = Arc::new(SyntheticHost::new(SyntheticConfig::small()));
    let acquirer = Arc::new(StreamAcquirer::new(host.clone()));
    let ui = Arc::new(RecordingUi::default());
    let (event_tx, events) = recorder_ipc::event_channel();
    let session = RecordingSession::new(Arc::clone(&acquirer), backend, ui.clone(), event_tx);
    Fixture {
        host,
        acquirer,
        ui,
        events,
        session,
    }
}

/// Screen plus camera and microphone, short slices.
pub fn config() -> RecordingConfig {
    RecordingConfig {
        source_id: Some("screen:0".into()),
        capture_system_audio: false,
        timeslice_ms: 100,
        ..RecordingConfig::default()
    }
}

pub fn drain(events: &Receiver<RecorderEvent>) -> Vec<RecorderEvent> {
    events.try_iter().collect()
}

/// Block until `handle` has delivered a frame.
pub fn wait_for_frame(handle: &StreamHandle) -> VideoFrame {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(frame) = handle.poll_frame() {
            return frame;
        }
        assert!(Instant::now() < deadline, "no frame from {:?}", handle);
        thread::sleep(Duration::from_millis(5));
    }
}

/// Block until an event matching `pred` arrives.
pub fn wait_for_event(
    events: &Receiver<RecorderEvent>,
    pred: impl Fn(&RecorderEvent) -> bool,
) -> RecorderEvent {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if pred(&event) => return event,
            Ok(_) => {}
            Err(e) => panic!("expected event not received: {e}"),
        }
    }
}
