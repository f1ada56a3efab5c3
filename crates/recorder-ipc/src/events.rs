//! Events sent from the engine to the host.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::state::RecordingState;
use crate::types::{
    DeviceAvailability, DeviceInfo, FinalizedRecording, RecordingMetrics, Source, StreamKind,
    WarningType,
};

/// Events that the engine can send to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecorderEvent {
    /// Recording state has changed.
    StateChanged {
        /// Previous state.
        previous: Box<RecordingState>,

        /// Current state.
        current: Box<RecordingState>,
    },

    /// A start or stop failed; the session has returned to Idle.
    FatalError {
        /// Error classification.
        kind: ErrorKind,

        /// Human-readable detail.
        detail: String,
    },

    /// A command was refused because of the current state.
    CommandRejected {
        /// Command name.
        command: String,

        /// Why it was refused.
        kind: ErrorKind,
    },

    /// Updated recording metrics.
    Metrics(RecordingMetrics),

    /// Performance warning detected.
    PerformanceWarning(WarningType),

    /// List of capture sources.
    Sources(Vec<Source>),

    /// List of input devices.
    Devices {
        devices: Vec<DeviceInfo>,
        availability: DeviceAvailability,
    },

    /// A stream's tracks were enabled or disabled.
    TrackToggled { kind: StreamKind, enabled: bool },

    /// A recording was finalized and handed to the recording sink.
    RecordingFinalized {
        mime_type: String,
        duration_ms: u64,
        size_bytes: u64,
        file_extension: String,

        /// Size of the audio file, when audio was recorded.
        audio_size_bytes: Option<u64>,
    },

    /// Engine is ready.
    Ready,

    /// Engine has shut down.
    Shutdown,
}

impl RecorderEvent {
    /// Summary event for a finalized recording.
    pub fn finalized(recording: &FinalizedRecording) -> Self {
        Self::RecordingFinalized {
            mime_type: recording.mime_type.clone(),
            duration_ms: recording.duration_ms,
            size_bytes: recording.bytes.len() as u64,
            file_extension: recording.file_extension.clone(),
            audio_size_bytes: recording.audio.as_ref().map(|a| a.bytes.len() as u64),
        }
    }
}
