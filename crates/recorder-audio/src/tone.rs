//! Sine tone source for synthetic audio streams.

use std::f32::consts::TAU;

use crate::chunk::AudioChunk;
use crate::{CHANNELS, CHUNK_DURATION_100NS, SAMPLES_PER_CHUNK, SAMPLE_RATE};

/// Produces consecutive 10ms chunks of a stereo sine wave.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    frequency: f32,
    amplitude: f32,
    phase: f32,
    sequence: u64,
}

impl ToneGenerator {
    /// Create a generator. `amplitude` of 0.0 yields silence.
    pub fn new(frequency: f32, amplitude: f32) -> Self {
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            phase: 0.0,
            sequence: 0,
        }
    }

    /// Produce the next chunk.
    pub fn next_chunk(&mut self) -> AudioChunk {
        let step = TAU * self.frequency / SAMPLE_RATE as f32;
        let mut samples = Vec::with_capacity(SAMPLES_PER_CHUNK * CHANNELS as usize);
        for _ in 0..SAMPLES_PER_CHUNK {
            let value = self.phase.sin() * self.amplitude;
            for _ in 0..CHANNELS {
                samples.push(value);
            }
            self.phase = (self.phase + step) % TAU;
        }
        let chunk = AudioChunk::from_samples(
            &samples,
            self.sequence * CHUNK_DURATION_100NS,
            self.sequence,
        );
        self.sequence += 1;
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_chunks_are_contiguous() {
        let mut tone = ToneGenerator::new(440.0, 0.5);
        let first = tone.next_chunk();
        let second = tone.next_chunk();
        assert_eq!(first.frame_count(), SAMPLES_PER_CHUNK);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.pts_100ns, CHUNK_DURATION_100NS);
        assert!(first.peak() <= 0.5 + f32::EPSILON);
        assert!(first.peak() > 0.4);
    }

    #[test]
    fn test_zero_amplitude_is_silent() {
        let mut tone = ToneGenerator::new(440.0, 0.0);
        assert_eq!(tone.next_chunk().peak(), 0.0);
    }
}
