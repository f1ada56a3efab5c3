//! Error types for the encoder module.

use recorder_ipc::ErrorKind;
use thiserror::Error;

/// Errors that can occur during encoding operations.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// No candidate container is supported by the backend.
    #[error("No supported container format (tried {tried})")]
    Unsupported { tried: usize },

    /// The backend cannot produce this MIME type.
    #[error("MIME type not supported by {backend}: {mime}")]
    UnsupportedMime { backend: &'static str, mime: String },

    /// General initialization error.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// Writing the audio file failed.
    #[error("Audio write failed: {0}")]
    Audio(#[from] hound::Error),

    /// The encoder was already finished.
    #[error("Encoder already finished")]
    Finished,
}

impl EncoderError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported { .. } | Self::UnsupportedMime { .. } | Self::Initialization(_) => {
                ErrorKind::EncoderUnsupported
            }
            Self::InvalidInput(_) | Self::Audio(_) | Self::Finished => {
                ErrorKind::InternalCompositionFailure
            }
        }
    }
}
