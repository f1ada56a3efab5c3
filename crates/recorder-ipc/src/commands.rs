//! Commands sent from the host to the engine.

use serde::{Deserialize, Serialize};

use crate::settings::{RecorderSettings, RecordingConfig};
use crate::types::StreamKind;

/// Commands that the host can send to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecorderCommand {
    /// Re-list capture sources.
    RefreshSources,

    /// Re-list input devices and their availability.
    RefreshDevices,

    /// Open the given source for preview and remember it.
    SelectSource { source_id: String },

    /// Start recording with the given configuration.
    Start { config: RecordingConfig },

    /// Pause the current recording.
    Pause,

    /// Resume a paused recording.
    Resume,

    /// Stop and finalize the current recording.
    Stop,

    /// Enable or disable every track of an open stream.
    ToggleTrack { kind: StreamKind, enabled: bool },

    /// Replace the settings; the compositor picks them up on the next tick.
    UpdateSettings(Box<RecorderSettings>),

    /// Request current recording state.
    GetState,

    /// Shutdown the engine completely.
    Shutdown,
}

impl RecorderCommand {
    /// Returns a short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshSources => "RefreshSources",
            Self::RefreshDevices => "RefreshDevices",
            Self::SelectSource { .. } => "SelectSource",
            Self::Start { .. } => "Start",
            Self::Pause => "Pause",
            Self::Resume => "Resume",
            Self::Stop => "Stop",
            Self::ToggleTrack { .. } => "ToggleTrack",
            Self::UpdateSettings(_) => "UpdateSettings",
            Self::GetState => "GetState",
            Self::Shutdown => "Shutdown",
        }
    }
}
