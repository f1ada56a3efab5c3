//! Error types for the recording engine.

use recorder_audio::AudioError;
use recorder_capture::CaptureError;
use recorder_encoder::EncoderError;
use recorder_ipc::{ErrorKind, StreamKind};
use thiserror::Error;

/// Errors raised by the recording session and engine.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// `start` was called outside `Idle`.
    #[error("A recording is already in progress")]
    AlreadyRecording,

    /// The operation is not valid in the current state.
    #[error("{operation} is not valid while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The start was cancelled between phases.
    #[error("Recording start cancelled")]
    Cancelled,

    /// No stream of this kind is open.
    #[error("No {} stream is open", .0.name())]
    StreamNotOpen(StreamKind),

    /// Stream acquisition failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The audio mixer failed.
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// The encoder failed.
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    /// Settings could not be encoded.
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// A host collaborator failed to read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRecording => ErrorKind::AlreadyRecording,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::StreamNotOpen(_) => ErrorKind::DeviceNotFound,
            Self::Capture(e) => e.kind(),
            Self::Encoder(e) => e.kind(),
            Self::Audio(_) | Self::Settings(_) | Self::Io(_) => {
                ErrorKind::InternalCompositionFailure
            }
        }
    }
}
