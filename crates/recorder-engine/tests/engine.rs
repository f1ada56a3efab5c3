mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{config, wait_for_event, RecordingUi};
use parking_lot::Mutex;
use recorder_capture::{SyntheticConfig, SyntheticHost};
use recorder_compositor::CompositeFrame;
use recorder_encoder::{i420_buffer_size, RawVideoBackend};
use recorder_engine::{
    decode_settings, EngineHandle, EngineHosts, MemoryRecordingSink, MemorySettingsStore,
    PreviewSink,
};
use recorder_ipc::{
    ErrorKind, FinalizedRecording, LayoutMode, RecorderCommand, RecorderEvent, RecorderSettings,
    RecordingConfig, StreamKind, WarningType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeenFrame {
    layout: LayoutMode,
    size: (u32, u32),
    degraded: bool,
}

#[derive(Default)]
struct PreviewLog {
    count: u64,
    last: Option<SeenFrame>,
}

#[derive(Clone, Default)]
struct LoggingPreview(Arc<Mutex<PreviewLog>>);

impl LoggingPreview {
    fn count(&self) -> u64 {
        self.0.lock().count
    }

    fn last(&self) -> SeenFrame {
        self.0.lock().last.unwrap()
    }
}

impl PreviewSink for LoggingPreview {
    fn on_composited_frame(&mut self, frame: &CompositeFrame) {
        let mut log = self.0.lock();
        log.count += 1;
        log.last = Some(SeenFrame {
            layout: frame.layout,
            size: frame.dimensions(),
            degraded: frame.is_degraded(),
        });
    }
}

struct Harness {
    engine: EngineHandle,
    host: Arc<SyntheticHost>,
    ui: Arc<RecordingUi>,
    store: MemorySettingsStore,
    sink: MemoryRecordingSink,
    preview: LoggingPreview,
}

fn spawn() -> Harness {
    let host = Arc::new(SyntheticHost::new(SyntheticConfig::small()));
    let ui = Arc::new(RecordingUi::default());
    let store = MemorySettingsStore::new();
    let sink = MemoryRecordingSink::new();
    let preview = LoggingPreview::default();
    let hosts = EngineHosts {
        capture: host.clone(),
        encoder: Arc::new(RawVideoBackend::new()),
        settings_store: Box::new(store.clone()),
        ui: ui.clone(),
        recording_sink: Box::new(sink.clone()),
        preview: Some(Box::new(preview.clone())),
    };
    let engine = EngineHandle::spawn(hosts).unwrap();
    wait_for_event(engine.events(), |e| matches!(e, RecorderEvent::Ready));
    Harness {
        engine,
        host,
        ui,
        store,
        sink,
        preview,
    }
}

fn is_recording(event: &RecorderEvent) -> bool {
    matches!(event, RecorderEvent::StateChanged { current, .. } if current.is_recording())
}

fn start(h: &Harness, config: RecordingConfig) {
    h.engine.send(RecorderCommand::Start { config });
    wait_for_event(h.engine.events(), is_recording);
}

/// Stop and return the one recording handed to the sink.
fn stop(h: &Harness) -> FinalizedRecording {
    h.engine.send(RecorderCommand::Stop);
    wait_for_event(h.engine.events(), |e| {
        matches!(e, RecorderEvent::RecordingFinalized { .. })
    });
    let mut saved = h.sink.saved();
    assert_eq!(saved.len(), 1);
    saved.remove(0).1
}

/// Number of whole frames of `width` x `height` after `header`.
fn frame_count(recording: &FinalizedRecording, header: &str, width: u32, height: u32) -> usize {
    assert!(recording.bytes.starts_with(header.as_bytes()));
    let frame = "FRAME\n".len() + i420_buffer_size(width, height);
    let body = recording.bytes.len() - header.len();
    assert_eq!(body % frame, 0, "partial frame in output");
    body / frame
}

fn source_ended(kind: StreamKind) -> impl Fn(&RecorderEvent) -> bool {
    move |e| {
        matches!(
            e,
            RecorderEvent::PerformanceWarning(WarningType::SourceEnded { kind: k }) if *k == kind
        )
    }
}

#[test]
fn test_lists_sources() {
    let h = spawn();
    h.engine.send(RecorderCommand::RefreshSources);
    let event = wait_for_event(h.engine.events(), |e| matches!(e, RecorderEvent::Sources(_)));
    let RecorderEvent::Sources(sources) = event else {
        unreachable!()
    };
    assert_eq!(sources.len(), 2);
    h.engine.shutdown();
}

#[test]
fn test_record_through_engine() {
    let h = spawn();
    let events = h.engine.events();

    h.engine.send(RecorderCommand::SelectSource {
        source_id: "screen:0".into(),
    });
    h.engine.send(RecorderCommand::Start { config: config() });
    wait_for_event(events, is_recording);

    h.engine.send(RecorderCommand::Start { config: config() });
    wait_for_event(events, |e| {
        matches!(
            e,
            RecorderEvent::CommandRejected {
                kind: ErrorKind::AlreadyRecording,
                ..
            }
        )
    });

    h.engine.send(RecorderCommand::ToggleTrack {
        kind: StreamKind::Microphone,
        enabled: false,
    });
    wait_for_event(events, |e| {
        matches!(
            e,
            RecorderEvent::TrackToggled {
                kind: StreamKind::Microphone,
                enabled: false
            }
        )
    });

    thread::sleep(Duration::from_millis(300));
    h.engine.send(RecorderCommand::Stop);
    let finalized = wait_for_event(events, |e| {
        matches!(e, RecorderEvent::RecordingFinalized { .. })
    });
    let RecorderEvent::RecordingFinalized {
        file_extension,
        size_bytes,
        ..
    } = finalized
    else {
        unreachable!()
    };
    assert_eq!(file_extension, "y4m");
    assert!(size_bytes > 0);

    let saved = h.sink.saved();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].0.starts_with("recording-"));
    assert!(saved[0].0.ends_with(".y4m"));
    assert_eq!(saved[0].1.bytes.len() as u64, size_bytes);

    let persisted = decode_settings(&h.store.blob().unwrap());
    assert_eq!(persisted.last_source_id.as_deref(), Some("screen:0"));
    assert!(h.preview.count() > 0);

    h.engine.shutdown();
}

#[test]
fn test_stop_while_idle_is_rejected() {
    let h = spawn();
    h.engine.send(RecorderCommand::Stop);
    wait_for_event(h.engine.events(), |e| {
        matches!(
            e,
            RecorderEvent::CommandRejected {
                kind: ErrorKind::InvalidState,
                ..
            }
        )
    });
    assert!(h.sink.saved().is_empty());
}

#[test]
fn test_shutdown_stops_active_recording() {
    let h = spawn();
    h.engine.send(RecorderCommand::Start { config: config() });
    wait_for_event(h.engine.events(), is_recording);
    thread::sleep(Duration::from_millis(100));

    let sink = h.sink.clone();
    h.engine.shutdown();
    assert_eq!(sink.saved().len(), 1);
}

#[test]
fn test_camera_only_recording_uses_camera_geometry() {
    let h = spawn();
    start(
        &h,
        RecordingConfig {
            layout: LayoutMode::CameraOnly,
            ..config()
        },
    );
    thread::sleep(Duration::from_millis(300));
    assert_eq!(h.preview.last().layout, LayoutMode::CameraOnly);
    assert_eq!(h.preview.last().size, (160, 120));

    let recording = stop(&h);
    let header = "YUV4MPEG2 W160 H120 F30:1 Ip A1:1 C420jpeg\n";
    assert!(frame_count(&recording, header, 160, 120) > 0);
}

#[test]
fn test_layout_change_while_recording_applies_after_stop() {
    let h = spawn();
    start(&h, config());
    thread::sleep(Duration::from_millis(150));

    let mut settings = RecorderSettings::default();
    settings.composition.layout = LayoutMode::CameraOnly;
    h.engine
        .send(RecorderCommand::UpdateSettings(Box::new(settings)));
    thread::sleep(Duration::from_millis(250));

    let seen = h.preview.last();
    assert_eq!(seen.layout, LayoutMode::ScreenWithCameraPip);
    assert_eq!(seen.size, (320, 180));
    let persisted = decode_settings(&h.store.blob().unwrap());
    assert_eq!(persisted.composition.layout, LayoutMode::CameraOnly);

    let recording = stop(&h);
    let header = "YUV4MPEG2 W320 H180 F30:1 Ip A1:1 C420jpeg\n";
    assert!(frame_count(&recording, header, 320, 180) > 5);

    thread::sleep(Duration::from_millis(150));
    assert_eq!(h.preview.last().layout, LayoutMode::CameraOnly);
    h.engine.shutdown();
}

#[test]
fn test_recording_continues_after_screen_ends() {
    let h = spawn();
    start(&h, config());
    thread::sleep(Duration::from_millis(150));

    h.host.end_stream(StreamKind::Screen);
    wait_for_event(h.engine.events(), source_ended(StreamKind::Screen));
    thread::sleep(Duration::from_millis(200));

    assert!(h.sink.saved().is_empty());
    assert!(h
        .ui
        .notifications()
        .iter()
        .any(|n| n.starts_with("Screen capture ended")));
    let seen = h.preview.last();
    assert_eq!(seen.size, (320, 180));
    assert!(seen.degraded);

    let recording = stop(&h);
    let header = "YUV4MPEG2 W320 H180 F30:1 Ip A1:1 C420jpeg\n";
    assert!(frame_count(&recording, header, 320, 180) > 5);
    h.engine.shutdown();
}

#[test]
fn test_recording_continues_after_camera_ends() {
    let h = spawn();
    start(&h, config());
    thread::sleep(Duration::from_millis(150));

    h.host.end_stream(StreamKind::Camera);
    wait_for_event(h.engine.events(), source_ended(StreamKind::Camera));
    thread::sleep(Duration::from_millis(150));

    assert!(h.sink.saved().is_empty());
    assert!(h
        .ui
        .notifications()
        .iter()
        .any(|n| n.starts_with("Camera capture ended")));
    assert!(!h.preview.last().degraded);

    let recording = stop(&h);
    assert!(!recording.bytes.is_empty());
    assert_eq!(
        h.ui
            .notifications()
            .iter()
            .filter(|n| n.starts_with("Camera capture ended"))
            .count(),
        1
    );
    h.engine.shutdown();
}
