mod common;

use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{config, drain, fixture, fixture_with, wait_for_frame, Fixture, NoCodecs};
use recorder_compositor::Compositor;
use recorder_encoder::{WAV_MIME, Y4M_MIME};
use recorder_engine::RecorderError;
use recorder_ipc::{
    CompositionSettings, ErrorKind, LayoutMode, OverlayKind, PermissionKind, PermissionStatus,
    RecorderEvent, RecordingConfig, RecordingState, StopReason, StreamKind,
};

fn fatal_errors(events: &[RecorderEvent]) -> Vec<ErrorKind> {
    events
        .iter()
        .filter_map(|e| match e {
            RecorderEvent::FatalError { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

fn states(events: &[RecorderEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|e| match e {
            RecorderEvent::StateChanged { current, .. } => Some(current.name()),
            _ => None,
        })
        .collect()
}

/// Feed composited screen frames to the session for `duration`.
fn record_for(f: &mut Fixture, compositor: &mut Compositor, duration: Duration) {
    let screen = f.session.stream(StreamKind::Screen).unwrap();
    let settings = CompositionSettings::default();
    let mut frame = wait_for_frame(&screen);
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        frame = screen.poll_frame().unwrap_or(frame);
        let composite = compositor.tick(Some(&frame), None, &settings, None);
        f.session.push_frame(&composite).unwrap();
        thread::sleep(Duration::from_millis(20));
    }
}

/// Peak level of every 10ms window of a stereo float WAV.
fn window_peaks(wav: Vec<u8>) -> Vec<f32> {
    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, 48_000);
    let samples: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
    samples
        .chunks(960)
        .map(|window| window.iter().fold(0.0f32, |peak, s| peak.max(s.abs())))
        .collect()
}

#[test]
fn test_start_walks_phases_into_recording() {
    let mut f = fixture();
    f.session.start(&config(), &AtomicBool::new(false)).unwrap();

    assert!(f.session.state().is_recording());
    assert_eq!(f.session.track_count(), 2);
    let events = drain(&f.events);
    assert_eq!(
        states(&events),
        ["Starting", "Starting", "Starting", "Starting", "Starting", "Recording"]
    );
    assert_eq!(f.ui.overlays(), [(OverlayKind::CameraPip, false)]);
}

#[test]
fn test_second_start_is_rejected() {
    let mut f = fixture();
    let cancel = AtomicBool::new(false);
    f.session.start(&config(), &cancel).unwrap();
    let mime = f.session.mime_type().map(str::to_owned);
    let tracks = f.session.track_count();
    let opens = f.host.opens();
    drain(&f.events);

    let err = f.session.start(&config(), &cancel).unwrap_err();
    assert!(matches!(err, RecorderError::AlreadyRecording));
    assert_eq!(err.kind(), ErrorKind::AlreadyRecording);

    assert!(f.session.state().is_recording());
    assert_eq!(f.session.mime_type().map(str::to_owned), mime);
    assert_eq!(f.session.track_count(), tracks);
    assert_eq!(f.host.opens(), opens);
    assert!(drain(&f.events).is_empty());
}

#[test]
fn test_mic_toggle_keeps_tracks() {
    let mut f = fixture();
    f.session.start(&config(), &AtomicBool::new(false)).unwrap();

    let mic = f.session.stream(StreamKind::Microphone).unwrap();
    let handle_tracks = mic.track_count();
    let encoder_tracks = f.session.track_count();

    f.session.toggle_track(StreamKind::Microphone, false).unwrap();
    assert_eq!(mic.track_count(), handle_tracks);
    assert_eq!(f.session.track_count(), encoder_tracks);
    assert!(mic.tracks().iter().all(|t| !t.is_enabled()));
    assert!(mic.is_open());

    f.session.toggle_track(StreamKind::Microphone, true).unwrap();
    assert!(mic.tracks().iter().all(|t| t.is_enabled()));
    assert_eq!(f.session.track_count(), encoder_tracks);
}

#[test]
fn test_muted_microphone_records_silence_without_gap() {
    let mut f = fixture();
    let mut compositor = Compositor::new();
    f.session.start(&config(), &AtomicBool::new(false)).unwrap();

    record_for(&mut f, &mut compositor, Duration::from_millis(300));
    f.session.toggle_track(StreamKind::Microphone, false).unwrap();
    record_for(&mut f, &mut compositor, Duration::from_millis(400));
    f.session.toggle_track(StreamKind::Microphone, true).unwrap();
    record_for(&mut f, &mut compositor, Duration::from_millis(300));

    let recording = f.session.stop(StopReason::UserRequested).unwrap();
    let audio = recording.audio.expect("mixed audio");
    assert_eq!(audio.mime_type, WAV_MIME);
    assert_eq!(audio.file_extension, "wav");
    assert!(
        audio.duration_ms + 150 >= recording.duration_ms
            && audio.duration_ms <= recording.duration_ms + 150,
        "audio {}ms, video {}ms",
        audio.duration_ms,
        recording.duration_ms
    );

    let peaks = window_peaks(audio.bytes);
    let longest_silence = peaks
        .split(|peak| *peak > 0.01)
        .map(<[f32]>::len)
        .max()
        .unwrap_or(0);
    assert!(longest_silence >= 25, "longest silence {longest_silence} windows");
    let loud = peaks.iter().filter(|peak| **peak > 0.1).count();
    assert!(loud >= 20, "{loud} loud windows");
}

#[test]
fn test_toggle_without_stream_fails() {
    let mut f = fixture();
    let err = f
        .session
        .toggle_track(StreamKind::SystemAudio, false)
        .unwrap_err();
    assert!(matches!(err, RecorderError::StreamNotOpen(StreamKind::SystemAudio)));
}

#[test]
fn test_pause_excludes_paused_time() {
    let mut f = fixture();
    f.session.start(&config(), &AtomicBool::new(false)).unwrap();

    thread::sleep(Duration::from_millis(60));
    f.session.pause().unwrap();
    assert!(f.session.state().is_paused());
    let at_pause = f.session.elapsed();

    thread::sleep(Duration::from_millis(200));
    assert_eq!(f.session.elapsed(), at_pause);

    f.session.resume().unwrap();
    thread::sleep(Duration::from_millis(60));
    let elapsed = f.session.elapsed();
    assert!(elapsed >= Duration::from_millis(120), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(250), "{elapsed:?}");

    let recording = f.session.stop(StopReason::UserRequested).unwrap();
    assert!(recording.duration_ms < 300, "{}", recording.duration_ms);
}

#[test]
fn test_pause_and_resume_need_matching_state() {
    let mut f = fixture();
    let err = f.session.pause().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    f.session.start(&config(), &AtomicBool::new(false)).unwrap();
    assert_eq!(f.session.resume().unwrap_err().kind(), ErrorKind::InvalidState);
    f.session.pause().unwrap();
    assert_eq!(f.session.pause().unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
fn test_stop_from_paused_finalizes() {
    let mut f = fixture();
    f.session.start(&config(), &AtomicBool::new(false)).unwrap();
    f.session.pause().unwrap();

    let recording = f.session.stop(StopReason::UserRequested).unwrap();
    assert_eq!(recording.file_extension, "y4m");
    assert!(f.session.state().is_idle());
    assert_eq!(f.host.active_streams(), 0);

    let events = drain(&f.events);
    assert!(states(&events).ends_with(&["Stopping", "Stopping", "Finalizing", "Idle"]));
    assert_eq!(f.ui.overlays().last(), Some(&(OverlayKind::CameraPip, true)));
}

#[test]
fn test_stop_when_idle_is_invalid() {
    let mut f = fixture();
    let err = f.session.stop(StopReason::UserRequested).unwrap_err();
    assert!(matches!(err, RecorderError::InvalidState { operation: "stop", .. }));
}

#[test]
fn test_camera_permission_denied_records_screen_only() {
    let mut f = fixture();
    f.host.set_permission(PermissionKind::Camera, PermissionStatus::Denied);
    f.host.set_permission_response(PermissionKind::Camera, false);

    f.session.start(&config(), &AtomicBool::new(false)).unwrap();
    assert!(f.session.state().is_recording());
    assert!(f.session.stream(StreamKind::Camera).is_none());
    assert!(f.session.stream(StreamKind::Screen).is_some());

    let events = drain(&f.events);
    assert!(fatal_errors(&events).is_empty());
    let notifications = f.ui.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].contains("camera"));
}

#[test]
fn test_cancel_releases_partial_streams() {
    let mut f = fixture();
    let cancel = AtomicBool::new(true);

    let err = f.session.start(&config(), &cancel).unwrap_err();
    assert!(matches!(err, RecorderError::Cancelled));
    assert!(f.session.state().is_idle());
    assert_eq!(f.host.opens(), 1);
    assert_eq!(f.host.active_streams(), 0);
    assert_eq!(f.acquirer.open_count(), 0);

    let events = drain(&f.events);
    assert!(fatal_errors(&events).is_empty());
    assert!(events.iter().any(|e| matches!(
        e,
        RecorderEvent::StateChanged { current, .. }
            if matches!(**current, RecordingState::Stopping { reason: StopReason::Cancelled, .. })
    )));
}

#[test]
fn test_required_screen_failure_is_fatal() {
    let mut f = fixture();
    f.host.fail_open(StreamKind::Screen, "NotAllowedError");

    let err = f.session.start(&config(), &AtomicBool::new(false)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(f.session.state().is_idle());

    let events = drain(&f.events);
    assert_eq!(fatal_errors(&events), [ErrorKind::PermissionDenied]);
    assert!(states(&events).ends_with(&["Error", "Idle"]));
    assert_eq!(f.host.active_streams(), 0);
}

#[test]
fn test_camera_only_requires_camera() {
    let mut f = fixture();
    f.host.fail_open(StreamKind::Camera, "NotFoundError");
    let config = RecordingConfig {
        layout: LayoutMode::CameraOnly,
        ..config()
    };

    let err = f.session.start(&config, &AtomicBool::new(false)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
    assert_eq!(fatal_errors(&drain(&f.events)), [ErrorKind::DeviceNotFound]);
    assert_eq!(f.host.active_streams(), 0);
}

#[test]
fn test_unsupported_encoder_rolls_back() {
    let mut f = fixture_with(Arc::new(NoCodecs));

    let err = f.session.start(&config(), &AtomicBool::new(false)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncoderUnsupported);
    assert!(f.session.state().is_idle());
    assert_eq!(f.host.active_streams(), 0);
    assert_eq!(
        fatal_errors(&drain(&f.events)),
        [ErrorKind::EncoderUnsupported]
    );
}

#[test]
fn test_preview_stream_is_borrowed_not_closed() {
    let mut f = fixture();
    let preview = f.acquirer.open(StreamKind::Screen, Some("screen:0")).unwrap();

    f.session.start(&config(), &AtomicBool::new(false)).unwrap();
    assert_eq!(
        f.session.stream(StreamKind::Screen).map(|h| h.id()),
        Some(preview.id())
    );
    f.session.stop(StopReason::UserRequested).unwrap();

    assert!(preview.is_open());
    assert_eq!(f.acquirer.open_count(), 1);
    assert_eq!(f.host.active_streams(), 1);
}

#[test]
fn test_mime_preference_falls_back_to_builtin() {
    let mut f = fixture();
    let config = RecordingConfig {
        preferred_mime: Some("video/webm;codecs=vp9".into()),
        preferred_format: Some("webm".into()),
        ..config()
    };
    f.session.start(&config, &AtomicBool::new(false)).unwrap();
    assert_eq!(f.session.mime_type(), Some(Y4M_MIME));
}
