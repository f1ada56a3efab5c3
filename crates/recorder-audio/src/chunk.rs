//! Interleaved f32 audio chunks.

use bytes::Bytes;

use crate::error::AudioError;
use crate::{AudioResult, CHANNELS};

const BYTES_PER_FRAME: usize = std::mem::size_of::<f32>() * CHANNELS as usize;

/// A chunk of interleaved stereo f32 samples, little-endian.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Audio samples as f32 interleaved stereo.
    pub data: Bytes,

    /// Presentation timestamp in 100ns units, relative to stream start.
    pub pts_100ns: u64,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl AudioChunk {
    /// Build a chunk from interleaved samples.
    pub fn from_samples(samples: &[f32], pts_100ns: u64, sequence: u64) -> Self {
        let mut data = Vec::with_capacity(samples.len() * std::mem::size_of::<f32>());
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self {
            data: Bytes::from(data),
            pts_100ns,
            sequence,
        }
    }

    /// Build a silent chunk of `frames` stereo frames.
    pub fn silence(frames: usize, pts_100ns: u64, sequence: u64) -> Self {
        Self {
            data: Bytes::from(vec![0u8; frames * BYTES_PER_FRAME]),
            pts_100ns,
            sequence,
        }
    }

    /// Get the number of sample frames in this chunk.
    pub fn frame_count(&self) -> usize {
        self.data.len() / BYTES_PER_FRAME
    }

    /// Check that the payload is a whole number of frames.
    pub fn validate(&self) -> AudioResult<()> {
        if self.data.len() % BYTES_PER_FRAME != 0 {
            return Err(AudioError::MalformedChunk {
                len: self.data.len(),
            });
        }
        Ok(())
    }

    /// Decode the interleaved samples.
    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.data
            .chunks_exact(std::mem::size_of::<f32>())
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Peak absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_decode() {
        let chunk = AudioChunk::from_samples(&[0.25, -0.5, 1.0, 0.0], 0, 0);
        assert_eq!(chunk.frame_count(), 2);
        let decoded: Vec<f32> = chunk.samples().collect();
        assert_eq!(decoded, vec![0.25, -0.5, 1.0, 0.0]);
        assert_eq!(chunk.peak(), 1.0);
    }

    #[test]
    fn test_silence() {
        let chunk = AudioChunk::silence(480, 0, 3);
        assert_eq!(chunk.frame_count(), 480);
        assert_eq!(chunk.peak(), 0.0);
        assert!(chunk.validate().is_ok());
    }

    #[test]
    fn test_malformed_chunk() {
        let chunk = AudioChunk {
            data: Bytes::from_static(&[0, 0, 0]),
            pts_100ns: 0,
            sequence: 0,
        };
        assert!(matches!(
            chunk.validate(),
            Err(AudioError::MalformedChunk { len: 3 })
        ));
    }
}
