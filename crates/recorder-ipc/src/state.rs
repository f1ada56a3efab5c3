//! Recording state machine types.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// The current state of the recording session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum RecordingState {
    /// No recording; preview may still be running.
    #[default]
    Idle,

    /// Acquiring streams and starting the encoder.
    Starting {
        /// Current startup phase.
        phase: StartupPhase,
    },

    /// Composite frames are being encoded.
    Recording {
        /// Negotiated container MIME type.
        mime_type: String,
    },

    /// Encoder suspended; nothing is flushed.
    Paused {
        /// Negotiated container MIME type.
        mime_type: String,
    },

    /// Tearing the session down.
    Stopping {
        /// Reason for stopping.
        reason: StopReason,

        /// Current shutdown phase.
        phase: ShutdownPhase,
    },

    /// Concatenating chunks into the final artifact.
    Finalizing,

    /// Start or stop failed. The only exit is `Idle` after cleanup.
    Error {
        /// Error classification.
        kind: ErrorKind,

        /// Error message.
        message: String,
    },
}

impl RecordingState {
    /// Returns true if no recording exists.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if the session is starting.
    pub fn is_starting(&self) -> bool {
        matches!(self, Self::Starting { .. })
    }

    /// Returns true while frames are being encoded.
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    /// Returns true while the encoder is suspended.
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    /// Returns true if a recording is in progress, paused or not.
    pub fn is_active(&self) -> bool {
        self.is_recording() || self.is_paused()
    }

    /// Returns true if the session is stopping or finalizing.
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping { .. } | Self::Finalizing)
    }

    /// Returns true if the session is in an error state.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting { .. } => "Starting",
            Self::Recording { .. } => "Recording",
            Self::Paused { .. } => "Paused",
            Self::Stopping { .. } => "Stopping",
            Self::Finalizing => "Finalizing",
            Self::Error { .. } => "Error",
        }
    }
}

/// Startup phases for a recording, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupPhase {
    /// Opening the screen or window stream.
    AcquireScreen,

    /// Opening the camera.
    AcquireCamera,

    /// Opening the microphone.
    AcquireMicrophone,

    /// Opening system audio loopback.
    AcquireSystemAudio,

    /// Negotiating the container and starting the encoder.
    StartEncoder,
}

impl StartupPhase {
    /// The first phase of every start.
    pub const FIRST: Self = Self::AcquireScreen;

    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::AcquireScreen => Some(Self::AcquireCamera),
            Self::AcquireCamera => Some(Self::AcquireMicrophone),
            Self::AcquireMicrophone => Some(Self::AcquireSystemAudio),
            Self::AcquireSystemAudio => Some(Self::StartEncoder),
            Self::StartEncoder => None,
        }
    }

    /// Returns the previous phase, if any (for rollback).
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::AcquireScreen => None,
            Self::AcquireCamera => Some(Self::AcquireScreen),
            Self::AcquireMicrophone => Some(Self::AcquireCamera),
            Self::AcquireSystemAudio => Some(Self::AcquireMicrophone),
            Self::StartEncoder => Some(Self::AcquireSystemAudio),
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::AcquireScreen => "Opening screen",
            Self::AcquireCamera => "Opening camera",
            Self::AcquireMicrophone => "Opening microphone",
            Self::AcquireSystemAudio => "Opening system audio",
            Self::StartEncoder => "Starting encoder",
        }
    }
}

/// Shutdown phases for a recording, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownPhase {
    /// Flushing the final encoder slice.
    FlushEncoder,

    /// Closing the streams the session opened.
    ReleaseStreams,
}

impl ShutdownPhase {
    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::FlushEncoder => Some(Self::ReleaseStreams),
            Self::ReleaseStreams => None,
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::FlushEncoder => "Flushing encoder",
            Self::ReleaseStreams => "Releasing streams",
        }
    }
}

/// Reason for stopping a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    /// User requested stop.
    UserRequested,

    /// The start was cancelled before the encoder ran.
    Cancelled,

    /// The engine is shutting down.
    EngineShutdown,
}

impl StopReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> &'static str {
        match self {
            Self::UserRequested => "Recording stopped by user",
            Self::Cancelled => "Recording start cancelled",
            Self::EngineShutdown => "Recorder shutting down",
        }
    }
}
