//! The recording session state machine.
//!
//! A session owns the encoder and the chunk sequence of one recording at a
//! time. It borrows streams through the [`StreamAcquirer`]: streams it finds
//! already open (a live preview) are used but never closed, streams it opens
//! itself are closed when the recording ends. Track toggles only flip the
//! tracks' enabled flags, so the encoder's track set is fixed from `start`
//! to `stop`. The layout and the output size are fixed the same way: the
//! first encoded frame sets the size and later frames are scaled to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::Sender;
use recorder_capture::{StreamAcquirer, StreamHandle};
use recorder_compositor::{CompositeFrame, Degradation};
use recorder_encoder::{file_extension, EncoderBackend, VideoInput};
use recorder_ipc::{
    FinalizedRecording, LayoutMode, OverlayKind, RecordedAudio, RecorderEvent, RecordingConfig,
    RecordingState, ShutdownPhase, StartupPhase, StopReason, StreamKind,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::RecorderError;
use crate::host::{UiHost, NOTIFICATION_DURATION};
use crate::resources::{AcquisitionNotice, ResourceManager};
use crate::RecorderResult;

/// Recorded time, excluding paused spans.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionClock {
    started: Instant,
    paused_total: Duration,
    paused_at: Option<Instant>,
}

impl SessionClock {
    pub(crate) fn start(now: Instant) -> Self {
        Self {
            started: now,
            paused_total: Duration::ZERO,
            paused_at: None,
        }
    }

    pub(crate) fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub(crate) fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
    }

    pub(crate) fn elapsed_at(&self, now: Instant) -> Duration {
        let end = self.paused_at.unwrap_or(now);
        end.saturating_duration_since(self.started)
            .saturating_sub(self.paused_total)
    }
}

/// What one [`RecordingSession::push_frame`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// The frame reached the encoder.
    pub encoded: bool,

    /// Encoded bytes collected during the call.
    pub bytes: u64,
}

/// One recording at a time: start, pause, resume, toggle, stop.
pub struct RecordingSession {
    manager: ResourceManager,
    ui: Arc<dyn UiHost>,
    event_tx: Sender<RecorderEvent>,
    state: RecordingState,
    clock: Option<SessionClock>,
    layout: LayoutMode,
    output_size: Option<(u32, u32)>,
    mime_type: Option<String>,
    video_bits_per_second: u32,
    chunks: Vec<Bytes>,
    frames_encoded: u64,
    bytes_recorded: u64,
}

impl RecordingSession {
    /// Create an idle session.
    pub fn new(
        acquirer: Arc<StreamAcquirer>,
        backend: Arc<dyn EncoderBackend>,
        ui: Arc<dyn UiHost>,
        event_tx: Sender<RecorderEvent>,
    ) -> Self {
        Self {
            manager: ResourceManager::new(acquirer, backend),
            ui,
            event_tx,
            state: RecordingState::Idle,
            clock: None,
            layout: LayoutMode::default(),
            output_size: None,
            mime_type: None,
            video_bits_per_second: 0,
            chunks: Vec::new(),
            frames_encoded: 0,
            bytes_recorded: 0,
        }
    }

    /// Acquire streams, start the encoder and begin recording.
    ///
    /// Fails with [`RecorderError::AlreadyRecording`] outside `Idle`, leaving
    /// the running recording untouched. `cancel` is checked after every
    /// startup phase; when set, everything acquired so far is released.
    #[instrument(name = "session_start", skip(self, config, cancel), fields(layout = ?config.layout))]
    pub fn start(&mut self, config: &RecordingConfig, cancel: &AtomicBool) -> RecorderResult<()> {
        if !self.state.is_idle() {
            warn!(state = self.state.name(), "Start refused");
            return Err(RecorderError::AlreadyRecording);
        }

        info!("Starting recording");
        let mut phase = StartupPhase::FIRST;
        loop {
            self.transition_to(RecordingState::Starting { phase });

            match self.manager.init_phase(config, phase) {
                Ok(Some(notice)) => self.notify(&notice),
                Ok(None) => {}
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            }

            if cancel.load(Ordering::SeqCst) {
                self.cancel_start();
                return Err(RecorderError::Cancelled);
            }

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        let mime_type = match self.manager.resources().encoder.as_ref() {
            Some(encoder) => encoder.mime_type().to_string(),
            None => {
                let e = RecorderError::InvalidState {
                    operation: "start",
                    state: "Starting",
                };
                self.fail(&e);
                return Err(e);
            }
        };

        self.layout = config.layout;
        self.output_size = None;
        self.video_bits_per_second = config.video_bits_per_second;
        self.mime_type = Some(mime_type.clone());
        self.chunks.clear();
        self.frames_encoded = 0;
        self.bytes_recorded = 0;
        self.clock = Some(SessionClock::start(Instant::now()));

        self.ui.show_overlay_window(OverlayKind::CameraPip, false);
        self.transition_to(RecordingState::Recording {
            mime_type: mime_type.clone(),
        });
        info!(
            mime = %mime_type,
            tracks = self.track_count(),
            bits_per_second = self.video_bits_per_second,
            "Recording started"
        );
        Ok(())
    }

    /// Encode one composite frame along with the mixed audio queued since
    /// the last call. Ignored unless recording.
    ///
    /// Frames are held back until the layout's required source has
    /// delivered, so the output geometry comes from a real frame. Frames of
    /// another size than the first encoded one are scaled to it.
    pub fn push_frame(&mut self, frame: &CompositeFrame) -> RecorderResult<PushOutcome> {
        if !self.state.is_recording() {
            return Ok(PushOutcome::default());
        }

        if self.frames_encoded == 0 && self.missing_required(frame) {
            trace!("Waiting for the first source frame");
            return Ok(PushOutcome::default());
        }

        let resized;
        let frame = match self.output_size {
            Some((width, height)) if frame.dimensions() != (width, height) => {
                trace!(from = ?frame.dimensions(), to = ?(width, height), "Scaling frame");
                resized = frame.resized(width, height);
                &resized
            }
            _ => frame,
        };

        let pts_100ns = (self.elapsed().as_nanos() / 100) as u64;
        let (width, height) = frame.dimensions();
        let encoder = self
            .manager
            .resources_mut()
            .encoder
            .as_mut()
            .ok_or(RecorderError::InvalidState {
                operation: "push_frame",
                state: "Recording",
            })?;
        encoder.push_video(VideoInput {
            width,
            height,
            rgba: frame.as_rgba(),
            pts_100ns,
        })?;
        if self.output_size.is_none() {
            self.output_size = Some((width, height));
        }
        self.frames_encoded += 1;

        self.drain_audio()?;
        let bytes = self.collect_chunks();
        Ok(PushOutcome {
            encoded: true,
            bytes,
        })
    }

    /// Suspend the encoder. Valid only while recording.
    #[instrument(name = "session_pause", skip(self))]
    pub fn pause(&mut self) -> RecorderResult<()> {
        let RecordingState::Recording { mime_type } = &self.state else {
            return Err(self.invalid("pause"));
        };
        let mime_type = mime_type.clone();

        if let Some(encoder) = self.manager.resources_mut().encoder.as_mut() {
            encoder.pause();
        }
        if let Some(clock) = self.clock.as_mut() {
            clock.pause(Instant::now());
        }
        self.transition_to(RecordingState::Paused { mime_type });
        info!(elapsed_ms = self.elapsed().as_millis() as u64, "Recording paused");
        Ok(())
    }

    /// Resume the encoder. Valid only while paused.
    #[instrument(name = "session_resume", skip(self))]
    pub fn resume(&mut self) -> RecorderResult<()> {
        let RecordingState::Paused { mime_type } = &self.state else {
            return Err(self.invalid("resume"));
        };
        let mime_type = mime_type.clone();

        if let Some(encoder) = self.manager.resources_mut().encoder.as_mut() {
            encoder.resume();
        }
        if let Some(clock) = self.clock.as_mut() {
            clock.resume(Instant::now());
        }
        self.transition_to(RecordingState::Recording { mime_type });
        info!("Recording resumed");
        Ok(())
    }

    /// Enable or disable the tracks of the open `kind` stream.
    ///
    /// Valid in any state; the encoder keeps its track set.
    pub fn toggle_track(&mut self, kind: StreamKind, enabled: bool) -> RecorderResult<()> {
        let handle = self
            .stream(kind)
            .ok_or(RecorderError::StreamNotOpen(kind))?;
        self.manager.acquirer().set_track_enabled(&handle, enabled);
        info!(kind = kind.name(), enabled, "Track toggled");
        Ok(())
    }

    /// Flush the encoder and return the finished recording.
    ///
    /// Valid while recording or paused. Streams the session opened are
    /// closed; borrowed streams stay open.
    #[instrument(name = "session_stop", skip(self))]
    pub fn stop(&mut self, reason: StopReason) -> RecorderResult<FinalizedRecording> {
        if !self.state.is_active() {
            return Err(self.invalid("stop"));
        }

        let duration = self.elapsed();
        let mime_type = self.mime_type.take().unwrap_or_default();
        info!(reason = reason.message(), "Stopping recording");

        self.transition_to(RecordingState::Stopping {
            reason: reason.clone(),
            phase: ShutdownPhase::FlushEncoder,
        });
        self.manager.stop_mixer();
        if let Err(e) = self.drain_audio() {
            warn!("Dropping remaining audio: {}", e);
        }

        let finished = match self.manager.resources_mut().encoder.as_mut() {
            Some(encoder) => encoder
                .finish()
                .map(|()| encoder.take_audio())
                .map_err(RecorderError::from),
            None => Err(RecorderError::InvalidState {
                operation: "stop",
                state: "Stopping",
            }),
        };
        self.collect_chunks();
        self.manager.resources_mut().encoder = None;
        self.manager.resources_mut().chunk_rx = None;

        let audio = match finished {
            Ok(audio) => audio.map(|audio| RecordedAudio {
                duration_ms: audio.duration_ms(),
                bytes: audio.data.to_vec(),
                mime_type: audio.mime_type.to_string(),
                file_extension: audio.file_extension.to_string(),
            }),
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        self.transition_to(RecordingState::Stopping {
            reason,
            phase: ShutdownPhase::ReleaseStreams,
        });
        self.manager.release_streams();

        self.transition_to(RecordingState::Finalizing);
        let total: usize = self.chunks.iter().map(Bytes::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in self.chunks.drain(..) {
            bytes.extend_from_slice(&chunk);
        }

        let recording = FinalizedRecording {
            bytes,
            file_extension: file_extension(&mime_type).to_string(),
            mime_type,
            duration_ms: duration.as_millis() as u64,
            audio,
        };
        self.clock = None;
        self.output_size = None;

        self.ui.show_overlay_window(OverlayKind::CameraPip, true);
        self.transition_to(RecordingState::Idle);
        info!(
            duration_ms = recording.duration_ms,
            bytes = recording.bytes.len(),
            audio_bytes = recording.audio.as_ref().map_or(0, |a| a.bytes.len()),
            frames = self.frames_encoded,
            "Recording finalized"
        );
        Ok(recording)
    }

    /// Recorded time so far, pauses excluded.
    pub fn elapsed(&self) -> Duration {
        self.clock
            .map(|clock| clock.elapsed_at(Instant::now()))
            .unwrap_or_default()
    }

    pub fn state(&self) -> &RecordingState {
        &self.state
    }

    /// Tracks bound to the running encoder; 0 when none runs.
    pub fn track_count(&self) -> usize {
        self.manager
            .resources()
            .encoder
            .as_ref()
            .map_or(0, |encoder| encoder.tracks().count())
    }

    /// Negotiated MIME type of the running recording.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    pub fn bytes_recorded(&self) -> u64 {
        self.bytes_recorded
    }

    /// The stream of `kind` this session uses, or any open one.
    pub fn stream(&self, kind: StreamKind) -> Option<StreamHandle> {
        self.manager
            .resources()
            .stream(kind)
            .map(|s| s.handle.clone())
            .or_else(|| self.manager.acquirer().get(kind))
    }

    /// Layout of the active recording, fixed at start.
    pub fn active_layout(&self) -> Option<LayoutMode> {
        self.state.is_active().then_some(self.layout)
    }

    /// Size every frame of the active recording is encoded at, once known.
    pub fn output_size(&self) -> Option<(u32, u32)> {
        self.output_size
    }

    fn requires(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Screen => self.layout.requires_screen(),
            StreamKind::Camera => self.layout.requires_camera(),
            StreamKind::Microphone | StreamKind::SystemAudio => false,
        }
    }

    fn missing_required(&self, frame: &CompositeFrame) -> bool {
        frame.degraded.iter().any(|d| match d {
            Degradation::Missing(kind) | Degradation::InvalidFrame(kind) => self.requires(*kind),
        })
    }

    fn drain_audio(&mut self) -> RecorderResult<()> {
        let resources = self.manager.resources_mut();
        if let (Some(audio_rx), Some(encoder)) =
            (resources.audio_rx.as_ref(), resources.encoder.as_mut())
        {
            for chunk in audio_rx.try_iter() {
                encoder.push_audio(&chunk)?;
            }
        }
        Ok(())
    }

    fn collect_chunks(&mut self) -> u64 {
        let Some(chunk_rx) = self.manager.resources().chunk_rx.clone() else {
            return 0;
        };
        let mut bytes = 0;
        for chunk in chunk_rx.try_iter() {
            trace!(index = chunk.index, len = chunk.data.len(), "Chunk received");
            bytes += chunk.data.len() as u64;
            self.chunks.push(chunk.data);
        }
        self.bytes_recorded += bytes;
        bytes
    }

    fn notify(&self, notice: &AcquisitionNotice) {
        self.ui
            .show_transient_notification(&notice.message, NOTIFICATION_DURATION);
    }

    fn cancel_start(&mut self) {
        info!("Start cancelled, releasing partial resources");
        self.transition_to(RecordingState::Stopping {
            reason: StopReason::Cancelled,
            phase: ShutdownPhase::ReleaseStreams,
        });
        self.manager.rollback();
        self.transition_to(RecordingState::Idle);
    }

    /// Error → cleanup → Idle.
    fn fail(&mut self, e: &RecorderError) {
        let kind = e.kind();
        error!(kind = %kind, "Recording failed: {}", e);

        self.transition_to(RecordingState::Error {
            kind,
            message: e.to_string(),
        });
        self.manager.stop_mixer();
        self.manager.rollback();
        self.manager.release_streams();
        self.chunks.clear();
        self.clock = None;
        self.output_size = None;
        self.mime_type = None;

        self.send_event(RecorderEvent::FatalError {
            kind,
            detail: e.to_string(),
        });
        self.ui.show_overlay_window(OverlayKind::CameraPip, true);
        self.transition_to(RecordingState::Idle);
    }

    fn invalid(&self, operation: &'static str) -> RecorderError {
        RecorderError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }

    fn transition_to(&mut self, new_state: RecordingState) {
        let previous = std::mem::replace(&mut self.state, new_state.clone());

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        self.send_event(RecorderEvent::StateChanged {
            previous: Box::new(previous),
            current: Box::new(new_state),
        });
    }

    fn send_event(&self, event: RecorderEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.state.is_active() {
            warn!("Session dropped while recording, output discarded");
        }
        self.manager.stop_mixer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_runs() {
        let t0 = Instant::now();
        let clock = SessionClock::start(t0);
        assert_eq!(
            clock.elapsed_at(t0 + Duration::from_millis(250)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_clock_excludes_pauses() {
        let t0 = Instant::now();
        let mut clock = SessionClock::start(t0);
        clock.pause(t0 + Duration::from_millis(100));
        assert_eq!(
            clock.elapsed_at(t0 + Duration::from_millis(900)),
            Duration::from_millis(100)
        );

        clock.resume(t0 + Duration::from_millis(1100));
        assert_eq!(
            clock.elapsed_at(t0 + Duration::from_millis(1150)),
            Duration::from_millis(150)
        );
    }

    #[test]
    fn test_clock_double_pause_keeps_first() {
        let t0 = Instant::now();
        let mut clock = SessionClock::start(t0);
        clock.pause(t0 + Duration::from_millis(10));
        clock.pause(t0 + Duration::from_millis(50));
        clock.resume(t0 + Duration::from_millis(60));
        assert_eq!(
            clock.elapsed_at(t0 + Duration::from_millis(60)),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_clock_resume_without_pause_is_noop() {
        let t0 = Instant::now();
        let mut clock = SessionClock::start(t0);
        clock.resume(t0 + Duration::from_millis(30));
        assert_eq!(
            clock.elapsed_at(t0 + Duration::from_millis(40)),
            Duration::from_millis(40)
        );
    }
}
