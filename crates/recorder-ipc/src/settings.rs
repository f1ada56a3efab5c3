//! Versioned user settings and the per-recording configuration derived from them.

use serde::{Deserialize, Serialize};

use crate::types::{CompositionSettings, LayoutMode};

/// Current settings schema version. Blobs with another version are discarded.
pub const SETTINGS_VERSION: u32 = 1;

/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 30;

/// Default video bitrate (2.5 Mbps).
pub const DEFAULT_VIDEO_BITS_PER_SECOND: u32 = 2_500_000;

/// Default encoder slice interval.
pub const DEFAULT_TIMESLICE_MS: u32 = 1000;

/// Everything the recorder persists between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Schema version.
    pub version: u32,

    /// Layout, PIP style and chroma key.
    pub composition: CompositionSettings,

    /// Record the camera when available.
    pub capture_camera: bool,

    /// Record the microphone when available.
    pub capture_microphone: bool,

    /// Record system audio when available.
    pub capture_system_audio: bool,

    /// Exact container MIME type to try first.
    pub preferred_mime: Option<String>,

    /// Container family to try next ("webm", "mp4", "y4m").
    pub preferred_format: Option<String>,

    /// Output frame rate.
    pub fps: u32,

    /// Target video bitrate.
    pub video_bits_per_second: u32,

    /// Encoder slice interval in milliseconds.
    pub timeslice_ms: u32,

    /// Last selected capture source.
    pub last_source_id: Option<String>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            composition: CompositionSettings::default(),
            capture_camera: true,
            capture_microphone: true,
            capture_system_audio: false,
            preferred_mime: None,
            preferred_format: None,
            fps: DEFAULT_FPS,
            video_bits_per_second: DEFAULT_VIDEO_BITS_PER_SECOND,
            timeslice_ms: DEFAULT_TIMESLICE_MS,
            last_source_id: None,
        }
    }
}

impl RecorderSettings {
    /// Returns a copy with numeric fields forced into valid ranges.
    pub fn sanitized(mut self) -> Self {
        self.composition = self.composition.clamped();
        self.fps = self.fps.clamp(1, 120);
        self.timeslice_ms = self.timeslice_ms.max(10);
        if self.video_bits_per_second == 0 {
            self.video_bits_per_second = DEFAULT_VIDEO_BITS_PER_SECOND;
        }
        self
    }

    /// Build the configuration for one recording of `source_id`.
    pub fn recording_config(&self, source_id: Option<String>) -> RecordingConfig {
        RecordingConfig {
            source_id: source_id.or_else(|| self.last_source_id.clone()),
            layout: self.composition.layout,
            capture_camera: self.capture_camera,
            capture_microphone: self.capture_microphone,
            capture_system_audio: self.capture_system_audio,
            preferred_mime: self.preferred_mime.clone(),
            preferred_format: self.preferred_format.clone(),
            fps: self.fps,
            video_bits_per_second: self.video_bits_per_second,
            timeslice_ms: self.timeslice_ms,
        }
    }
}

/// Configuration for a single recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Screen or window to record. Required by layouts that draw the screen.
    pub source_id: Option<String>,

    /// Layout at start time; decides which source is required.
    pub layout: LayoutMode,

    pub capture_camera: bool,
    pub capture_microphone: bool,
    pub capture_system_audio: bool,

    pub preferred_mime: Option<String>,
    pub preferred_format: Option<String>,

    pub fps: u32,
    pub video_bits_per_second: u32,
    pub timeslice_ms: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        RecorderSettings::default().recording_config(None)
    }
}

impl RecordingConfig {
    /// Frame interval in milliseconds.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RecorderSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.fps, 30);
        assert_eq!(settings.video_bits_per_second, 2_500_000);
        assert_eq!(settings.timeslice_ms, 1000);
        assert!(settings.capture_camera);
        assert!(!settings.capture_system_audio);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: RecorderSettings =
            serde_json::from_str(r#"{"version":1,"fps":60}"#).unwrap();
        assert_eq!(settings.fps, 60);
        assert_eq!(settings.timeslice_ms, 1000);
        assert_eq!(settings.composition, CompositionSettings::default());
    }

    #[test]
    fn test_sanitized_clamps() {
        let settings = RecorderSettings {
            fps: 0,
            timeslice_ms: 0,
            video_bits_per_second: 0,
            ..RecorderSettings::default()
        }
        .sanitized();
        assert_eq!(settings.fps, 1);
        assert_eq!(settings.timeslice_ms, 10);
        assert_eq!(settings.video_bits_per_second, DEFAULT_VIDEO_BITS_PER_SECOND);
    }

    #[test]
    fn test_recording_config_falls_back_to_last_source() {
        let settings = RecorderSettings {
            last_source_id: Some("screen:1".into()),
            ..RecorderSettings::default()
        };
        assert_eq!(
            settings.recording_config(None).source_id.as_deref(),
            Some("screen:1")
        );
        assert_eq!(
            settings.recording_config(Some("window:7".into())).source_id.as_deref(),
            Some("window:7")
        );
    }
}
