//! Container negotiation and timesliced encoding.
//!
//! An [`EncoderBackend`] reports which MIME types it can produce and creates
//! [`MediaEncoder`]s bound to one video track plus any number of audio
//! tracks. Encoders emit their output in slices of roughly `timeslice_ms`
//! on an unbounded channel; slices are only ever concatenated in order.
//!
//! The built-in [`RawVideoBackend`] writes uncompressed YUV4MPEG2 and needs
//! no platform codec; the mixed audio goes to a WAV file beside it.

mod error;
mod mime;
mod raw;
mod yuv;

pub use error::EncoderError;
pub use mime::{
    container_of, file_extension, negotiate_mime_type, supported_formats, FormatInfo,
    MIME_FALLBACKS, WAV_MIME, Y4M_MIME,
};
pub use raw::{RawVideoBackend, Y4mEncoder};
pub use yuv::{i420_buffer_size, rgba_to_i420};

use crossbeam_channel::Receiver;
use recorder_audio::AudioChunk;

use bytes::Bytes;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Encoder configuration for one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Negotiated container MIME type.
    pub mime_type: String,

    /// Target frames per second.
    pub fps: u32,

    /// Target video bitrate.
    pub video_bits_per_second: u32,

    /// Slice interval in milliseconds of recorded time.
    pub timeslice_ms: u32,
}

/// Tracks an encoder is bound to. Fixed for the encoder's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderTracks {
    /// The single video track.
    pub video: Option<String>,

    /// Every audio track.
    pub audio: Vec<String>,
}

impl EncoderTracks {
    /// Number of bound tracks.
    pub fn count(&self) -> usize {
        usize::from(self.video.is_some()) + self.audio.len()
    }
}

/// One composited frame handed to an encoder.
#[derive(Debug, Clone, Copy)]
pub struct VideoInput<'a> {
    pub width: u32,
    pub height: u32,

    /// Tightly packed RGBA8.
    pub rgba: &'a [u8],

    /// Recorded time, pauses excluded, in 100ns units.
    pub pts_100ns: u64,
}

/// An encoded slice of the output container.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    /// Container bytes.
    pub data: Bytes,

    /// Slice index, starting at 0.
    pub index: u64,

    /// Recorded time at which the slice was cut, in milliseconds.
    pub cut_at_ms: u64,
}

/// Audio written beside a container that cannot carry it.
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub data: Bytes,
    pub mime_type: &'static str,
    pub file_extension: &'static str,

    /// Sample frames written, per channel.
    pub frames: u64,
}

impl EncodedAudio {
    /// Length of the audio at [`SAMPLE_RATE`](recorder_audio::SAMPLE_RATE).
    pub fn duration_ms(&self) -> u64 {
        self.frames * 1000 / u64::from(recorder_audio::SAMPLE_RATE)
    }
}

/// A running encoder.
pub trait MediaEncoder: Send {
    /// Receiver for emitted slices. Disconnects after [`finish`](Self::finish).
    fn chunks(&self) -> Receiver<EncodedChunk>;

    /// Encode one frame. Ignored while paused.
    fn push_video(&mut self, frame: VideoInput<'_>) -> EncoderResult<()>;

    /// Encode one mixed audio chunk. Ignored while paused.
    fn push_audio(&mut self, chunk: &AudioChunk) -> EncoderResult<()>;

    /// Stop accepting media without flushing.
    fn pause(&mut self);

    /// Accept media again.
    fn resume(&mut self);

    fn is_paused(&self) -> bool;

    /// Emit the final slice and close the chunk channel.
    fn finish(&mut self) -> EncoderResult<()>;

    /// Take the separately stored audio, once [`finish`](Self::finish) ran.
    /// Encoders whose container carries audio return `None`.
    fn take_audio(&mut self) -> Option<EncodedAudio> {
        None
    }

    /// Container MIME type.
    fn mime_type(&self) -> &str;

    /// Tracks this encoder is bound to.
    fn tracks(&self) -> &EncoderTracks;

    /// Encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// A source of encoders.
pub trait EncoderBackend: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns true if [`create`](Self::create) accepts this MIME type.
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Create an encoder for `config` bound to `tracks`.
    fn create(
        &self,
        config: &EncoderConfig,
        tracks: &EncoderTracks,
    ) -> EncoderResult<Box<dyn MediaEncoder>>;
}
