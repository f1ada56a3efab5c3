//! Built-in uncompressed YUV4MPEG2 encoder.

use std::io::Cursor;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use recorder_audio::{AudioChunk, CHANNELS, SAMPLE_RATE};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::EncoderError;
use crate::mime::{container_of, WAV_MIME, Y4M_MIME};
use crate::yuv::rgba_to_i420;
use crate::{
    EncodedAudio, EncodedChunk, EncoderBackend, EncoderConfig, EncoderResult, EncoderTracks, MediaEncoder,
    VideoInput,
};

/// Backend that produces `video/x-yuv4mpeg2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawVideoBackend;

impl RawVideoBackend {
    pub fn new() -> Self {
        Self
    }
}

impl EncoderBackend for RawVideoBackend {
    fn name(&self) -> &'static str {
        "y4m"
    }

    fn is_type_supported(&self, mime: &str) -> bool {
        container_of(mime) == "y4m"
    }

    #[instrument(name = "encoder_create", skip(self, config, tracks), fields(mime = %config.mime_type))]
    fn create(
        &self,
        config: &EncoderConfig,
        tracks: &EncoderTracks,
    ) -> EncoderResult<Box<dyn MediaEncoder>> {
        if !self.is_type_supported(&config.mime_type) {
            return Err(EncoderError::UnsupportedMime {
                backend: self.name(),
                mime: config.mime_type.clone(),
            });
        }
        Ok(Box::new(Y4mEncoder::new(config.clone(), tracks.clone())?))
    }
}

/// Writes composited frames as YUV4MPEG2 (I420) and cuts the stream into
/// slices every `timeslice_ms` of recorded time.
///
/// The stream geometry is fixed by the first frame; later frames of another
/// size are dropped. The container has no audio stream, so mixed audio is
/// buffered and written as a 32-bit float WAV on [`finish`](MediaEncoder::finish),
/// available from [`take_audio`](MediaEncoder::take_audio).
pub struct Y4mEncoder {
    config: EncoderConfig,
    tracks: EncoderTracks,
    sender: Option<Sender<EncodedChunk>>,
    receiver: Receiver<EncodedChunk>,
    buffer: Vec<u8>,
    geometry: Option<(u32, u32)>,
    paused: bool,
    next_cut_ms: u64,
    last_pts_ms: u64,
    chunk_index: u64,
    frames_written: u64,
    frames_dropped: u64,
    audio_chunks: u64,
    samples: Vec<f32>,
    audio: Option<EncodedAudio>,
}

impl Y4mEncoder {
    /// Create an encoder bound to `tracks`.
    pub fn new(config: EncoderConfig, tracks: EncoderTracks) -> EncoderResult<Self> {
        if tracks.video.is_none() {
            return Err(EncoderError::Initialization(
                "a video track is required".into(),
            ));
        }
        if config.fps == 0 || config.timeslice_ms == 0 {
            return Err(EncoderError::Initialization(format!(
                "invalid timing: fps={} timeslice={}ms",
                config.fps, config.timeslice_ms
            )));
        }

        let (sender, receiver) = crossbeam_channel::unbounded();
        info!(
            fps = config.fps,
            timeslice_ms = config.timeslice_ms,
            audio_tracks = tracks.audio.len(),
            "Y4M encoder created"
        );
        if !tracks.audio.is_empty() {
            debug!("Audio goes to a WAV file beside the YUV4MPEG2 output");
        }

        Ok(Self {
            next_cut_ms: config.timeslice_ms as u64,
            config,
            tracks,
            sender: Some(sender),
            receiver,
            buffer: Vec::new(),
            geometry: None,
            paused: false,
            last_pts_ms: 0,
            chunk_index: 0,
            frames_written: 0,
            frames_dropped: 0,
            audio_chunks: 0,
            samples: Vec::new(),
            audio: None,
        })
    }

    /// Frames written to the stream.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Frames dropped for not matching the stream geometry.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Audio chunks received.
    pub fn audio_chunks(&self) -> u64 {
        self.audio_chunks
    }

    /// Audio frames buffered so far, per channel.
    pub fn audio_frames(&self) -> u64 {
        (self.samples.len() / usize::from(CHANNELS)) as u64
    }

    fn write_wav(&mut self) -> EncoderResult<EncodedAudio> {
        let spec = hound::WavSpec {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let frames = self.audio_frames();
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in self.samples.drain(..) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        let data = Bytes::from(cursor.into_inner());
        debug!(frames, bytes = data.len(), "WAV written");
        Ok(EncodedAudio {
            data,
            mime_type: WAV_MIME,
            file_extension: "wav",
            frames,
        })
    }

    fn header(&self, width: u32, height: u32) -> String {
        format!(
            "YUV4MPEG2 W{} H{} F{}:1 Ip A1:1 C420jpeg\n",
            width, height, self.config.fps
        )
    }

    fn cut(&mut self, at_ms: u64) {
        if self.buffer.is_empty() {
            return;
        }
        let Some(sender) = &self.sender else {
            return;
        };
        let chunk = EncodedChunk {
            data: Bytes::from(std::mem::take(&mut self.buffer)),
            index: self.chunk_index,
            cut_at_ms: at_ms,
        };
        trace!(index = chunk.index, bytes = chunk.data.len(), "Slice emitted");
        // The receiver is owned by this encoder, so the send cannot fail.
        let _ = sender.send(chunk);
        self.chunk_index += 1;
    }
}

impl MediaEncoder for Y4mEncoder {
    fn chunks(&self) -> Receiver<EncodedChunk> {
        self.receiver.clone()
    }

    fn push_video(&mut self, frame: VideoInput<'_>) -> EncoderResult<()> {
        if self.sender.is_none() {
            return Err(EncoderError::Finished);
        }
        if self.paused {
            return Ok(());
        }
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.width == 0 || frame.height == 0 || frame.rgba.len() != expected {
            return Err(EncoderError::InvalidInput(format!(
                "{}x{} frame with {} bytes",
                frame.width,
                frame.height,
                frame.rgba.len()
            )));
        }

        match self.geometry {
            None => {
                let header = self.header(frame.width, frame.height);
                self.buffer.extend_from_slice(header.as_bytes());
                self.geometry = Some((frame.width, frame.height));
            }
            Some(geometry) if geometry != (frame.width, frame.height) => {
                self.frames_dropped += 1;
                warn!(
                    expected = ?geometry,
                    got = ?(frame.width, frame.height),
                    "Frame size changed mid-recording, dropping frame"
                );
                return Ok(());
            }
            Some(_) => {}
        }

        let pts_ms = frame.pts_100ns / 10_000;
        if pts_ms >= self.next_cut_ms {
            self.cut(pts_ms);
            let slice = self.config.timeslice_ms as u64;
            self.next_cut_ms = (pts_ms / slice + 1) * slice;
        }

        self.buffer.extend_from_slice(b"FRAME\n");
        self.buffer
            .extend_from_slice(&rgba_to_i420(frame.rgba, frame.width, frame.height));
        self.last_pts_ms = pts_ms;
        self.frames_written += 1;
        Ok(())
    }

    fn push_audio(&mut self, chunk: &AudioChunk) -> EncoderResult<()> {
        if self.sender.is_none() {
            return Err(EncoderError::Finished);
        }
        if self.paused {
            return Ok(());
        }
        chunk
            .validate()
            .map_err(|e| EncoderError::InvalidInput(e.to_string()))?;
        self.samples.extend(chunk.samples());
        self.audio_chunks += 1;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn finish(&mut self) -> EncoderResult<()> {
        if self.sender.is_none() {
            return Err(EncoderError::Finished);
        }
        self.cut(self.last_pts_ms);
        self.sender = None;
        if !self.tracks.audio.is_empty() {
            self.audio = Some(self.write_wav()?);
        }
        info!(
            frames = self.frames_written,
            dropped = self.frames_dropped,
            slices = self.chunk_index,
            audio_chunks = self.audio_chunks,
            "Y4M encoder finished"
        );
        Ok(())
    }

    fn take_audio(&mut self) -> Option<EncodedAudio> {
        self.audio.take()
    }

    fn mime_type(&self) -> &str {
        Y4M_MIME
    }

    fn tracks(&self) -> &EncoderTracks {
        &self.tracks
    }

    fn name(&self) -> &'static str {
        "y4m"
    }
}
