//! Main engine orchestrator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use recorder_capture::{SourceCatalog, StreamAcquirer, StreamHandle, VideoFrame};
use recorder_compositor::{Compositor, RecordingOverlay};
use recorder_ipc::{
    ErrorKind, RecorderCommand, RecorderEvent, RecorderSettings, RecordingConfig, StopReason,
    StreamKind, WarningType,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::RecorderError;
use crate::host::{
    recording_file_name, PreviewSink, RecordingSink, UiHost, NOTIFICATION_DURATION,
};
use crate::metrics::MetricsCollector;
use crate::session::RecordingSession;
use crate::settings::{load_settings, save_settings, SettingsStore};
use crate::EngineHosts;

/// How often metrics are reported while recording.
const METRICS_INTERVAL: Duration = Duration::from_secs(1);

/// Result of polling one video source for a tick.
#[derive(Default)]
struct Polled {
    frame: Option<VideoFrame>,

    /// The frame is the same one as last tick.
    repeated: bool,

    /// Set on the first tick after the source ended.
    warning: Option<WarningType>,
}

/// Last frame seen from one video source, to detect repeats and ends.
#[derive(Default)]
struct SourceWatch {
    handle_id: Option<u64>,
    last_sequence: Option<u64>,
    ended_reported: bool,
}

impl SourceWatch {
    /// Poll `handle`. An ended stream yields no frame.
    fn poll(&mut self, kind: StreamKind, handle: Option<StreamHandle>) -> Polled {
        let Some(handle) = handle else {
            *self = Self::default();
            return Polled::default();
        };
        if self.handle_id != Some(handle.id()) {
            *self = Self {
                handle_id: Some(handle.id()),
                ..Self::default()
            };
        }

        let frame = handle.poll_frame();
        if handle.is_ended() {
            let warning = (!self.ended_reported).then_some(WarningType::SourceEnded { kind });
            self.ended_reported = true;
            return Polled {
                warning,
                ..Polled::default()
            };
        }

        let sequence = frame.as_ref().map(|f| f.sequence);
        let repeated = sequence.is_some() && sequence == self.last_sequence;
        self.last_sequence = sequence;
        Polled {
            frame,
            repeated,
            warning: None,
        }
    }
}

/// The recorder engine: command loop and render loop on one thread.
pub struct Engine {
    command_rx: Receiver<RecorderCommand>,
    event_tx: Sender<RecorderEvent>,
    acquirer: Arc<StreamAcquirer>,
    catalog: SourceCatalog,
    compositor: Compositor,
    session: RecordingSession,
    settings: RecorderSettings,
    settings_store: Box<dyn SettingsStore>,
    recording_sink: Box<dyn RecordingSink>,
    preview: Option<Box<dyn PreviewSink>>,
    ui: Arc<dyn UiHost>,
    metrics: Arc<MetricsCollector>,
    cancel: Arc<AtomicBool>,
    screen_watch: SourceWatch,
    camera_watch: SourceWatch,
    frame_interval: Duration,
    last_metrics: Instant,
}

impl Engine {
    /// Create a new engine.
    pub fn new(
        command_rx: Receiver<RecorderCommand>,
        event_tx: Sender<RecorderEvent>,
        hosts: EngineHosts,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let settings = load_settings(hosts.settings_store.as_ref());
        let acquirer = Arc::new(StreamAcquirer::new(Arc::clone(&hosts.capture)));
        let session = RecordingSession::new(
            Arc::clone(&acquirer),
            Arc::clone(&hosts.encoder),
            Arc::clone(&hosts.ui),
            event_tx.clone(),
        );

        Self {
            command_rx,
            catalog: SourceCatalog::new(hosts.capture),
            acquirer,
            compositor: Compositor::new(),
            session,
            frame_interval: frame_interval(settings.fps),
            metrics: Arc::new(MetricsCollector::new(settings.fps as f32)),
            settings,
            settings_store: hosts.settings_store,
            recording_sink: hosts.recording_sink,
            preview: hosts.preview,
            ui: hosts.ui,
            event_tx,
            cancel,
            screen_watch: SourceWatch::default(),
            camera_watch: SourceWatch::default(),
            last_metrics: Instant::now(),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Run the engine (blocking).
    ///
    /// Waits for commands until the next frame deadline, then ticks.
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.send_event(RecorderEvent::Ready);

        let mut next_tick = Instant::now();
        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            match self.command_rx.recv_timeout(timeout) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.tick();
                    next_tick += self.frame_interval;
                    let now = Instant::now();
                    if next_tick < now {
                        trace!("Render loop behind, skipping missed ticks");
                        next_tick = now + self.frame_interval;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.shutdown();
                    break;
                }
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if engine should stop.
    fn handle_command(&mut self, command: RecorderCommand) -> bool {
        debug!(command = command.name(), "Handling command");

        match command {
            RecorderCommand::RefreshSources => self.send_sources(),
            RecorderCommand::RefreshDevices => self.send_devices(),
            RecorderCommand::SelectSource { source_id } => self.select_source(source_id),
            RecorderCommand::Start { config } => self.start_recording(config),
            RecorderCommand::Pause => {
                let result = self.session.pause();
                self.reject_on_error("Pause", result);
            }
            RecorderCommand::Resume => {
                let result = self.session.resume();
                self.reject_on_error("Resume", result);
            }
            RecorderCommand::Stop => self.stop_recording(StopReason::UserRequested),
            RecorderCommand::ToggleTrack { kind, enabled } => self.toggle_track(kind, enabled),
            RecorderCommand::UpdateSettings(settings) => self.update_settings(*settings),
            RecorderCommand::GetState => self.send_state(),
            RecorderCommand::Shutdown => {
                self.shutdown();
                return false;
            }
        }

        true
    }

    fn send_sources(&self) {
        match self.catalog.refresh() {
            Ok(sources) => self.send_event(RecorderEvent::Sources(sources)),
            Err(e) => {
                warn!("Source enumeration failed: {}", e);
                self.ui
                    .show_transient_notification(&e.to_string(), NOTIFICATION_DURATION);
                self.send_event(RecorderEvent::Sources(Vec::new()));
            }
        }
    }

    fn send_devices(&self) {
        match self.catalog.devices() {
            Ok(devices) => {
                let availability = self.catalog.device_availability().unwrap_or_default();
                self.send_event(RecorderEvent::Devices {
                    devices,
                    availability,
                });
            }
            Err(e) => warn!("Device enumeration failed: {}", e),
        }
    }

    /// Open `source_id` for preview, replacing the previous preview source.
    #[instrument(name = "select_source", skip(self))]
    fn select_source(&mut self, source_id: String) {
        if self.session.state().is_active() {
            self.send_event(RecorderEvent::CommandRejected {
                command: "SelectSource".into(),
                kind: ErrorKind::AlreadyRecording,
            });
            return;
        }

        if let Some(previous) = self.acquirer.get(StreamKind::Screen) {
            self.acquirer.close(&previous);
        }
        match self.acquirer.open(StreamKind::Screen, Some(&source_id)) {
            Ok(_) => {
                info!("Preview source selected");
                self.settings.last_source_id = Some(source_id);
                self.persist_settings();
            }
            Err(e) => {
                warn!("Failed to open preview source: {}", e);
                let message = recorder_capture::guidance(e.kind(), StreamKind::Screen);
                self.ui
                    .show_transient_notification(&message, NOTIFICATION_DURATION);
            }
        }
    }

    /// Start recording.
    #[instrument(name = "start_recording", skip(self, config))]
    fn start_recording(&mut self, config: RecordingConfig) {
        self.cancel.store(false, Ordering::SeqCst);

        match self.session.start(&config, &self.cancel) {
            Ok(()) => {
                self.frame_interval = frame_interval(config.fps);
                self.metrics = Arc::new(MetricsCollector::new(config.fps as f32));
                self.last_metrics = Instant::now();
                if config.source_id.is_some() && config.source_id != self.settings.last_source_id
                {
                    self.settings.last_source_id = config.source_id;
                    self.persist_settings();
                }
            }
            Err(RecorderError::Cancelled) => info!("Start cancelled"),
            Err(e) if e.kind().is_contract_violation() => self.reject("Start", &e),
            // The session already reported the failure.
            Err(e) => debug!("Start failed: {}", e),
        }
    }

    /// Stop recording and hand the result to the recording sink.
    #[instrument(name = "stop_recording", skip(self))]
    fn stop_recording(&mut self, reason: StopReason) {
        match self.session.stop(reason) {
            Ok(recording) => {
                let file_name = recording_file_name(&recording.file_extension);
                if let Err(e) = self.recording_sink.save(&file_name, &recording) {
                    error!("Failed to save recording: {}", e);
                    self.ui.show_transient_notification(
                        &format!("Could not save {file_name}: {e}"),
                        NOTIFICATION_DURATION,
                    );
                }
                self.send_event(RecorderEvent::finalized(&recording));
                self.frame_interval = frame_interval(self.settings.fps);
            }
            Err(e) if e.kind().is_contract_violation() => self.reject("Stop", &e),
            Err(e) => debug!("Stop failed: {}", e),
        }
    }

    fn toggle_track(&mut self, kind: StreamKind, enabled: bool) {
        match self.session.toggle_track(kind, enabled) {
            Ok(()) => self.send_event(RecorderEvent::TrackToggled { kind, enabled }),
            Err(e) => self.reject("ToggleTrack", &e),
        }
    }

    /// Apply and persist new settings. The layout and fps of an active
    /// recording stay fixed; the new ones apply from the next recording.
    fn update_settings(&mut self, settings: RecorderSettings) {
        self.settings = settings.sanitized();
        match self.session.active_layout() {
            Some(layout) if layout != self.settings.composition.layout => info!(
                recording = ?layout,
                requested = ?self.settings.composition.layout,
                "Layout change deferred until the recording ends"
            ),
            Some(_) => {}
            None => self.frame_interval = frame_interval(self.settings.fps),
        }
        self.persist_settings();
        debug!(layout = ?self.settings.composition.layout, "Settings updated");
    }

    fn persist_settings(&self) {
        if let Err(e) = save_settings(self.settings_store.as_ref(), &self.settings) {
            warn!("Failed to persist settings: {}", e);
        }
    }

    fn send_state(&self) {
        let state = self.session.state().clone();
        self.send_event(RecorderEvent::StateChanged {
            previous: Box::new(state.clone()),
            current: Box::new(state),
        });
    }

    /// Composite one frame, feed preview and session, report metrics.
    fn tick(&mut self) {
        let started = Instant::now();

        let screen = self
            .screen_watch
            .poll(StreamKind::Screen, self.session.stream(StreamKind::Screen));
        let camera = self
            .camera_watch
            .poll(StreamKind::Camera, self.session.stream(StreamKind::Camera));
        for warning in [&screen.warning, &camera.warning].into_iter().flatten() {
            if let WarningType::SourceEnded { kind } = warning {
                self.notify_source_ended(*kind);
            }
            self.send_event(RecorderEvent::PerformanceWarning(warning.clone()));
        }

        let state = self.session.state();
        let overlay = state.is_active().then(|| RecordingOverlay {
            elapsed_ms: self.session.elapsed().as_millis() as u64,
            paused: state.is_paused(),
        });

        let mut composition = self.settings.composition;
        if let Some(layout) = self.session.active_layout() {
            composition.layout = layout;
        }
        let frame = self.compositor.tick(
            screen.frame.as_ref(),
            camera.frame.as_ref(),
            &composition,
            overlay.as_ref(),
        );
        if screen.repeated || camera.repeated {
            self.metrics.record_duplicate();
        }

        if let Some(preview) = self.preview.as_mut() {
            preview.on_composited_frame(&frame);
        }

        match self.session.push_frame(&frame) {
            Ok(outcome) => {
                if outcome.encoded {
                    self.metrics.record_encoded();
                }
                self.metrics.record_bytes(outcome.bytes);
            }
            Err(e) => warn!("Frame not recorded: {}", e),
        }

        self.metrics.record_tick(started.elapsed(), frame.is_degraded());

        if self.session.state().is_active() && self.last_metrics.elapsed() >= METRICS_INTERVAL {
            self.emit_metrics();
        }
    }

    /// Tell the user a source is gone. An active recording keeps running
    /// and the compositor draws without the source.
    fn notify_source_ended(&self, kind: StreamKind) {
        let message = if self.session.state().is_active() {
            warn!(kind = kind.name(), "Source ended while recording");
            format!("{} capture ended. Recording continues without it.", title(kind))
        } else {
            info!(kind = kind.name(), "Source ended");
            format!("{} capture ended.", title(kind))
        };
        self.ui
            .show_transient_notification(&message, NOTIFICATION_DURATION);
    }

    fn emit_metrics(&mut self) {
        let metrics = self.metrics.snapshot(self.session.elapsed());
        self.send_event(RecorderEvent::Metrics(metrics));

        for warning in self.metrics.check_warnings() {
            self.send_event(RecorderEvent::PerformanceWarning(warning));
        }

        self.metrics.mark_reported();
        self.last_metrics = Instant::now();
    }

    fn shutdown(&mut self) {
        info!("Shutting down engine");
        if self.session.state().is_active() {
            self.stop_recording(StopReason::EngineShutdown);
        }
        self.acquirer.close_all();
        self.send_event(RecorderEvent::Shutdown);
    }

    fn reject_on_error(&self, command: &str, result: Result<(), RecorderError>) {
        if let Err(e) = result {
            self.reject(command, &e);
        }
    }

    fn reject(&self, command: &str, e: &RecorderError) {
        debug!(command, "Command rejected: {}", e);
        self.send_event(RecorderEvent::CommandRejected {
            command: command.to_string(),
            kind: e.kind(),
        });
    }

    fn send_event(&self, event: RecorderEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

fn title(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Screen => "Screen",
        StreamKind::Camera => "Camera",
        StreamKind::Microphone => "Microphone",
        StreamKind::SystemAudio => "System audio",
    }
}

fn frame_interval(fps: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1)))
}

/// Client side of an engine running on its own thread.
pub struct EngineHandle {
    command_tx: Sender<RecorderCommand>,
    event_rx: Receiver<RecorderEvent>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Spawn an engine thread over `hosts`.
    pub fn spawn(hosts: EngineHosts) -> std::io::Result<Self> {
        let (command_tx, command_rx) = recorder_ipc::command_channel();
        let (event_tx, event_rx) = recorder_ipc::event_channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let engine_cancel = Arc::clone(&cancel);
        let thread = thread::Builder::new()
            .name("recorder-engine".into())
            .spawn(move || {
                let mut engine = Engine::new(command_rx, event_tx, hosts, engine_cancel);
                engine.run();
            })?;

        Ok(Self {
            command_tx,
            event_rx,
            cancel,
            thread: Some(thread),
        })
    }

    /// Queue a command. Returns false if the engine is gone.
    pub fn send(&self, command: RecorderCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }

    /// Abandon a start in progress; checked between startup phases.
    pub fn cancel_start(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> &Receiver<RecorderEvent> {
        &self.event_rx
    }

    /// Shut the engine down and wait for its thread.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.command_tx.send(RecorderCommand::Shutdown);
            if thread.join().is_err() {
                error!("Engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.join();
    }
}
