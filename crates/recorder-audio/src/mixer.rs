//! Audio mixing functionality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace, warn};

use crate::chunk::AudioChunk;
use crate::error::AudioError;
use crate::{AudioResult, AUDIO_CHANNEL_CAPACITY, CHANNELS, SAMPLES_PER_CHUNK};

const SOFT_CLIP_KNEE: f32 = 0.8;

/// Input source for the mixer.
pub struct MixerInput {
    /// Name used in logs.
    pub label: String,

    /// Receiver for audio chunks from this source.
    pub receiver: Receiver<AudioChunk>,

    /// Volume multiplier (0.0 - 1.0).
    pub volume: Arc<RwLock<f32>>,

    /// Track enabled flag, shared with the capture track.
    pub enabled: Arc<AtomicBool>,
}

impl MixerInput {
    /// Create a new mixer input gated by `enabled`.
    pub fn new(
        label: impl Into<String>,
        receiver: Receiver<AudioChunk>,
        enabled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            label: label.into(),
            receiver,
            volume: Arc::new(RwLock::new(1.0)),
            enabled,
        }
    }

    /// Set the volume for this input.
    pub fn set_volume(&self, volume: f32) {
        *self.volume.write() = volume.clamp(0.0, 1.0);
    }

    /// Get the current volume.
    pub fn volume(&self) -> f32 {
        *self.volume.read()
    }

    /// Check if this input currently contributes audio.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Audio mixer that combines multiple input sources into 10ms stereo chunks.
pub struct AudioMixer {
    mix_thread: Option<JoinHandle<()>>,
    should_stop: Arc<AtomicBool>,
    input_count: usize,
}

impl AudioMixer {
    /// Create a new audio mixer.
    pub fn new() -> Self {
        Self {
            mix_thread: None,
            should_stop: Arc::new(AtomicBool::new(false)),
            input_count: 0,
        }
    }

    /// Returns true while the mix thread runs.
    pub fn is_running(&self) -> bool {
        self.mix_thread.is_some()
    }

    /// Number of inputs the running mixer consumes.
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Start mixing audio from the given inputs.
    #[instrument(name = "mixer_start", skip(self, inputs), fields(inputs = inputs.len()))]
    pub fn start(&mut self, inputs: Vec<MixerInput>) -> AudioResult<Receiver<AudioChunk>> {
        if self.mix_thread.is_some() {
            return Err(AudioError::AlreadyStarted);
        }
        if inputs.is_empty() {
            return Err(AudioError::NoInputs);
        }

        info!("Starting audio mixer");

        let (sender, receiver) = crossbeam_channel::bounded(AUDIO_CHANNEL_CAPACITY);

        self.should_stop.store(false, Ordering::SeqCst);
        let should_stop = Arc::clone(&self.should_stop);
        self.input_count = inputs.len();

        let handle = thread::Builder::new()
            .name("audio-mixer".into())
            .spawn(move || mix_thread(inputs, sender, should_stop))?;

        self.mix_thread = Some(handle);
        Ok(receiver)
    }

    /// Stop the mixer.
    #[instrument(name = "mixer_stop", skip(self))]
    pub fn stop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);

        if let Some(handle) = self.mix_thread.take() {
            info!("Stopping audio mixer");
            if handle.join().is_err() {
                warn!("Mixer thread panicked");
            }
            info!("Audio mixer stopped");
        }
        self.input_count = 0;
    }
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioMixer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn mix_thread(inputs: Vec<MixerInput>, sender: Sender<AudioChunk>, should_stop: Arc<AtomicBool>) {
    debug!("Mixer thread started");

    let mut mix_buffer = vec![0.0f32; SAMPLES_PER_CHUNK * CHANNELS as usize];
    let mut sequence = 0u64;
    let start_time = Instant::now();
    let chunk_duration = Duration::from_millis(10);
    let mut next_chunk_time = start_time;

    while !should_stop.load(Ordering::SeqCst) {
        mix_buffer.fill(0.0);

        for input in &inputs {
            // Drained even when disabled; a disabled input contributes silence.
            let Ok(chunk) = input.receiver.try_recv() else {
                continue;
            };
            if input.is_enabled() {
                mix_into(&mut mix_buffer, &chunk, input.volume());
            } else {
                trace!(input = %input.label, "Input disabled, mixing silence");
            }
        }

        for sample in mix_buffer.iter_mut() {
            *sample = soft_clip(*sample);
        }

        let elapsed = next_chunk_time.duration_since(start_time);
        let pts_100ns = elapsed.as_nanos() as u64 / 100;
        let output = AudioChunk::from_samples(&mix_buffer, pts_100ns, sequence);

        match sender.try_send(output) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                trace!("Mixed audio channel full, dropping chunk");
            }
            Err(TrySendError::Disconnected(_)) => break,
        }

        sequence += 1;
        next_chunk_time += chunk_duration;

        let now = Instant::now();
        if next_chunk_time > now {
            thread::sleep(next_chunk_time - now);
        }
    }

    debug!(chunks = sequence, "Mixer thread exiting");
}

/// Add `chunk` scaled by `volume` into `buffer`.
fn mix_into(buffer: &mut [f32], chunk: &AudioChunk, volume: f32) {
    for (slot, sample) in buffer.iter_mut().zip(chunk.samples()) {
        *slot += sample * volume;
    }
}

/// Soft clipping: linear below the knee, tanh-shaped above it, bounded by 1.0.
pub fn soft_clip(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= SOFT_CLIP_KNEE {
        return sample;
    }
    let headroom = 1.0 - SOFT_CLIP_KNEE;
    let shaped = SOFT_CLIP_KNEE + headroom * ((magnitude - SOFT_CLIP_KNEE) / headroom).tanh();
    shaped.copysign(sample)
}
