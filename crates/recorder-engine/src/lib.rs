//! Core orchestrator for the recorder.
//!
//! This crate ties capture, compositing, audio mixing and encoding together:
//! a [`RecordingSession`] drives one recording through its state machine,
//! and the [`Engine`] runs the command loop and the render loop on a single
//! thread, feeding every composited frame to the preview sink and the
//! session.

mod error;
mod host;
mod metrics;
mod orchestrator;
mod resources;
mod session;
mod settings;

pub use error::RecorderError;
pub use host::{
    recording_file_name, sidecar_file_name, DirectoryRecordingSink, MemoryRecordingSink,
    PreviewSink, RecordingSink, TracingUiHost, UiHost, NOTIFICATION_DURATION,
};
pub use metrics::MetricsCollector;
pub use orchestrator::{Engine, EngineHandle};
pub use resources::{
    AcquiredStream, AcquisitionNotice, ResourceManager, SessionResources, COMPOSITE_TRACK_ID,
};
pub use session::{PushOutcome, RecordingSession};
pub use settings::{
    decode_settings, encode_settings, load_settings, save_settings, FileSettingsStore,
    MemorySettingsStore, SettingsStore,
};

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use recorder_capture::CaptureHost;
use recorder_encoder::EncoderBackend;
use recorder_ipc::{RecorderCommand, RecorderEvent};

/// Result type for engine operations.
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Everything the engine consumes from its host.
pub struct EngineHosts {
    pub capture: Arc<dyn CaptureHost>,
    pub encoder: Arc<dyn EncoderBackend>,
    pub settings_store: Box<dyn SettingsStore>,
    pub ui: Arc<dyn UiHost>,
    pub recording_sink: Box<dyn RecordingSink>,
    pub preview: Option<Box<dyn PreviewSink>>,
}

/// Create an engine instance with IPC channels.
pub fn create_engine(
    command_rx: Receiver<RecorderCommand>,
    event_tx: Sender<RecorderEvent>,
    hosts: EngineHosts,
) -> Engine {
    Engine::new(command_rx, event_tx, hosts, Arc::new(AtomicBool::new(false)))
}
