//! Audio chunks and mixing for the recorder.
//!
//! Capture hosts deliver interleaved f32 stereo chunks per audio stream.
//! The [`AudioMixer`] combines the microphone and system-audio inputs on a
//! dedicated thread, substituting silence for disabled tracks so the
//! recorded audio timeline never has gaps.

mod chunk;
mod error;
mod mixer;
mod tone;

pub use chunk::AudioChunk;
pub use error::AudioError;
pub use mixer::{soft_clip, AudioMixer, MixerInput};
pub use tone::ToneGenerator;

/// Channel capacity for audio chunks.
pub const AUDIO_CHANNEL_CAPACITY: usize = 8;

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Audio sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48000;

/// Number of audio channels.
pub const CHANNELS: u16 = 2;

/// Sample frames per audio chunk (10ms at 48kHz).
pub const SAMPLES_PER_CHUNK: usize = 480;

/// Duration of one chunk in 100ns units.
pub const CHUNK_DURATION_100NS: u64 = 100_000;
