//! Per-recording resource acquisition and rollback.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use recorder_audio::{AudioChunk, AudioMixer, MixerInput};
use recorder_capture::{guidance, CaptureError, StreamAcquirer, StreamHandle};
use recorder_encoder::{
    negotiate_mime_type, EncodedChunk, EncoderBackend, EncoderConfig, EncoderTracks, MediaEncoder,
};
use recorder_ipc::{ErrorKind, RecordingConfig, StartupPhase, StreamKind, TrackKind};
use tracing::{debug, info, instrument, warn};

use crate::RecorderResult;

/// Id of the composite video track every encoder is bound to.
pub const COMPOSITE_TRACK_ID: &str = "composite-video";

/// A stream the session uses, and whether the session opened it.
#[derive(Debug, Clone)]
pub struct AcquiredStream {
    pub handle: StreamHandle,

    /// Opened by this session; closed when the session ends.
    pub owned: bool,
}

/// An optional feature that could not be acquired.
#[derive(Debug, Clone)]
pub struct AcquisitionNotice {
    pub stream: StreamKind,
    pub kind: ErrorKind,

    /// User-facing guidance.
    pub message: String,
}

/// Resources held by one recording.
#[derive(Default)]
pub struct SessionResources {
    pub screen: Option<AcquiredStream>,
    pub camera: Option<AcquiredStream>,
    pub microphone: Option<AcquiredStream>,
    pub system_audio: Option<AcquiredStream>,

    /// Mixes every audio stream into one.
    pub mixer: Option<AudioMixer>,

    /// Mixed audio.
    pub audio_rx: Option<Receiver<AudioChunk>>,

    pub encoder: Option<Box<dyn MediaEncoder>>,

    /// Encoded slices.
    pub chunk_rx: Option<Receiver<EncodedChunk>>,
}

impl SessionResources {
    /// The slot for `kind`.
    pub fn stream(&self, kind: StreamKind) -> Option<&AcquiredStream> {
        match kind {
            StreamKind::Screen => self.screen.as_ref(),
            StreamKind::Camera => self.camera.as_ref(),
            StreamKind::Microphone => self.microphone.as_ref(),
            StreamKind::SystemAudio => self.system_audio.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: StreamKind) -> &mut Option<AcquiredStream> {
        match kind {
            StreamKind::Screen => &mut self.screen,
            StreamKind::Camera => &mut self.camera,
            StreamKind::Microphone => &mut self.microphone,
            StreamKind::SystemAudio => &mut self.system_audio,
        }
    }

    fn audio_streams(&self) -> impl Iterator<Item = &AcquiredStream> {
        self.microphone.iter().chain(self.system_audio.iter())
    }
}

/// Acquires a recording's resources phase by phase and rolls them back.
pub struct ResourceManager {
    acquirer: Arc<StreamAcquirer>,
    backend: Arc<dyn EncoderBackend>,
    resources: SessionResources,
    current_phase: Option<StartupPhase>,
}

impl ResourceManager {
    pub fn new(acquirer: Arc<StreamAcquirer>, backend: Arc<dyn EncoderBackend>) -> Self {
        Self {
            acquirer,
            backend,
            resources: SessionResources::default(),
            current_phase: None,
        }
    }

    /// Run one startup phase.
    ///
    /// Optional features that fail are reported as a notice; failures of a
    /// required source or of the encoder are returned as errors.
    #[instrument(name = "init_phase", skip(self, config), fields(phase = phase.name()))]
    pub fn init_phase(
        &mut self,
        config: &RecordingConfig,
        phase: StartupPhase,
    ) -> RecorderResult<Option<AcquisitionNotice>> {
        self.current_phase = Some(phase);
        let layout = config.layout;

        match phase {
            StartupPhase::AcquireScreen => {
                if !layout.requires_screen() {
                    debug!("Layout does not draw the screen");
                    return Ok(None);
                }
                self.acquire(StreamKind::Screen, config.source_id.as_deref(), true)
            }
            StartupPhase::AcquireCamera => {
                let required = layout.requires_camera();
                if !required && !config.capture_camera {
                    return Ok(None);
                }
                self.acquire(StreamKind::Camera, None, required)
            }
            StartupPhase::AcquireMicrophone => {
                if !config.capture_microphone {
                    return Ok(None);
                }
                self.acquire(StreamKind::Microphone, None, false)
            }
            StartupPhase::AcquireSystemAudio => {
                if !config.capture_system_audio {
                    return Ok(None);
                }
                self.acquire(StreamKind::SystemAudio, None, false)
            }
            StartupPhase::StartEncoder => {
                self.start_encoder(config)?;
                Ok(None)
            }
        }
    }

    /// Reuse the open stream of `kind` or open a new one.
    fn acquire(
        &mut self,
        kind: StreamKind,
        source_id: Option<&str>,
        required: bool,
    ) -> RecorderResult<Option<AcquisitionNotice>> {
        if let Some(handle) = self.acquirer.get(kind) {
            if handle.is_open() && !handle.is_ended() {
                debug!(kind = kind.name(), "Reusing open stream");
                *self.resources.slot_mut(kind) = Some(AcquiredStream {
                    handle,
                    owned: false,
                });
                return Ok(None);
            }
            self.acquirer.close(&handle);
        }

        match self.acquirer.open(kind, source_id) {
            Ok(handle) => {
                *self.resources.slot_mut(kind) = Some(AcquiredStream {
                    handle,
                    owned: true,
                });
                Ok(None)
            }
            Err(e) if required => Err(e.into()),
            Err(e) => Ok(Some(notice(kind, &e))),
        }
    }

    fn start_encoder(&mut self, config: &RecordingConfig) -> RecorderResult<()> {
        let backend = Arc::clone(&self.backend);
        let mime_type = negotiate_mime_type(
            config.preferred_mime.as_deref(),
            config.preferred_format.as_deref(),
            |mime| backend.is_type_supported(mime),
        )?;

        let tracks = EncoderTracks {
            video: Some(COMPOSITE_TRACK_ID.to_string()),
            audio: self
                .resources
                .audio_streams()
                .flat_map(|s| s.handle.tracks_of(TrackKind::Audio))
                .map(|t| t.id.clone())
                .collect(),
        };
        let encoder_config = EncoderConfig {
            mime_type,
            fps: config.fps,
            video_bits_per_second: config.video_bits_per_second,
            timeslice_ms: config.timeslice_ms,
        };

        let encoder = self.backend.create(&encoder_config, &tracks)?;
        self.resources.chunk_rx = Some(encoder.chunks());
        info!(
            backend = self.backend.name(),
            encoder = encoder.name(),
            mime = %encoder.mime_type(),
            tracks = tracks.count(),
            "Encoder started"
        );
        self.resources.encoder = Some(encoder);

        let inputs: Vec<MixerInput> = self
            .resources
            .audio_streams()
            .filter_map(|s| {
                let track = s.handle.tracks_of(TrackKind::Audio).next()?;
                let receiver = s.handle.audio_receiver()?;
                Some(MixerInput::new(
                    s.handle.kind().name(),
                    receiver,
                    track.enabled_flag(),
                ))
            })
            .collect();
        if !inputs.is_empty() {
            let mut mixer = AudioMixer::new();
            self.resources.audio_rx = Some(mixer.start(inputs)?);
            self.resources.mixer = Some(mixer);
        }
        Ok(())
    }

    /// Undo every phase from the current one back to the first.
    #[instrument(name = "rollback_resources", skip(self))]
    pub fn rollback(&mut self) {
        if let Some(mut phase) = self.current_phase {
            loop {
                info!("Rolling back phase: {}", phase.name());
                self.rollback_phase(phase);

                match phase.previous() {
                    Some(prev) => phase = prev,
                    None => break,
                }
            }
        }
        self.current_phase = None;
    }

    fn rollback_phase(&mut self, phase: StartupPhase) {
        match phase {
            StartupPhase::StartEncoder => {
                self.stop_mixer();
                self.resources.encoder = None;
                self.resources.chunk_rx = None;
            }
            StartupPhase::AcquireSystemAudio => self.release(StreamKind::SystemAudio),
            StartupPhase::AcquireMicrophone => self.release(StreamKind::Microphone),
            StartupPhase::AcquireCamera => self.release(StreamKind::Camera),
            StartupPhase::AcquireScreen => self.release(StreamKind::Screen),
        }
    }

    /// Stop the mixer. Mixed audio still queued stays readable.
    pub fn stop_mixer(&mut self) {
        if let Some(mut mixer) = self.resources.mixer.take() {
            mixer.stop();
        }
    }

    /// Drop every stream reference, closing only the streams this session opened.
    #[instrument(name = "release_streams", skip(self))]
    pub fn release_streams(&mut self) {
        for kind in [
            StreamKind::SystemAudio,
            StreamKind::Microphone,
            StreamKind::Camera,
            StreamKind::Screen,
        ] {
            self.release(kind);
        }
        self.resources.audio_rx = None;
        self.current_phase = None;
    }

    fn release(&mut self, kind: StreamKind) {
        if let Some(stream) = self.resources.slot_mut(kind).take() {
            if stream.owned {
                self.acquirer.close(&stream.handle);
            } else {
                debug!(kind = kind.name(), "Leaving borrowed stream open");
            }
        }
    }

    pub fn acquirer(&self) -> &Arc<StreamAcquirer> {
        &self.acquirer
    }

    pub fn resources(&self) -> &SessionResources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut SessionResources {
        &mut self.resources
    }

    pub fn current_phase(&self) -> Option<StartupPhase> {
        self.current_phase
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.stop_mixer();
        self.release_streams();
    }
}

fn notice(kind: StreamKind, error: &CaptureError) -> AcquisitionNotice {
    let error_kind = error.kind();
    warn!(
        stream = kind.name(),
        kind = %error_kind,
        "Optional stream unavailable, continuing without it: {}",
        error
    );
    AcquisitionNotice {
        stream: kind,
        kind: error_kind,
        message: guidance(error_kind, kind),
    }
}
