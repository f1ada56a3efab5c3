//! Error types for the audio module.

use thiserror::Error;

/// Errors that can occur during audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Mixer already running.
    #[error("Audio mixer already started")]
    AlreadyStarted,

    /// Mixer has no inputs to consume.
    #[error("Audio mixer has no inputs")]
    NoInputs,

    /// Chunk payload is not a whole number of stereo f32 frames.
    #[error("Malformed audio chunk: {len} bytes")]
    MalformedChunk { len: usize },

    /// Mixer thread could not be spawned.
    #[error("Mixer thread failed to start: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}
