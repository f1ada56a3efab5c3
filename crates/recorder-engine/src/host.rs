//! Collaborators the engine calls back into.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use recorder_compositor::CompositeFrame;
use recorder_ipc::{FinalizedRecording, OverlayKind};
use tracing::{info, warn};

/// How long acquisition warnings stay on screen.
pub const NOTIFICATION_DURATION: Duration = Duration::from_secs(4);

/// Window and notification host.
pub trait UiHost: Send + Sync {
    /// Show or hide an overlay window.
    fn show_overlay_window(&self, kind: OverlayKind, visible: bool);

    /// Show a message that disappears after `duration`.
    fn show_transient_notification(&self, message: &str, duration: Duration);
}

/// Receives finished recordings (the file-save collaborator).
pub trait RecordingSink: Send {
    fn save(&mut self, file_name: &str, recording: &FinalizedRecording) -> io::Result<()>;
}

/// Receives every composited frame for live preview.
pub trait PreviewSink: Send {
    fn on_composited_frame(&mut self, frame: &CompositeFrame);
}

/// `recording-<unix-ms>.<ext>`.
pub fn recording_file_name(extension: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("recording-{millis}.{extension}")
}

/// A [`UiHost`] without windows that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUiHost;

impl UiHost for TracingUiHost {
    fn show_overlay_window(&self, kind: OverlayKind, visible: bool) {
        info!(?kind, visible, "Overlay window");
    }

    fn show_transient_notification(&self, message: &str, duration: Duration) {
        warn!(duration_ms = duration.as_millis() as u64, "{}", message);
    }
}

/// Writes recordings into a directory. Separate audio goes beside the
/// video under the same stem.
#[derive(Debug, Clone)]
pub struct DirectoryRecordingSink {
    dir: PathBuf,
    last_path: Option<PathBuf>,
}

impl DirectoryRecordingSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_path: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the most recently saved recording.
    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }
}

/// `<stem>.<extension>` for a file saved beside `file_name`.
pub fn sidecar_file_name(file_name: &str, extension: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    format!("{stem}.{extension}")
}

impl RecordingSink for DirectoryRecordingSink {
    fn save(&mut self, file_name: &str, recording: &FinalizedRecording) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, &recording.bytes)?;
        info!(
            path = %path.display(),
            bytes = recording.bytes.len(),
            "Recording saved"
        );
        if let Some(audio) = &recording.audio {
            let audio_path = self
                .dir
                .join(sidecar_file_name(file_name, &audio.file_extension));
            fs::write(&audio_path, &audio.bytes)?;
            info!(
                path = %audio_path.display(),
                bytes = audio.bytes.len(),
                "Audio saved"
            );
        }
        self.last_path = Some(path);
        Ok(())
    }
}

/// Keeps recordings in memory. Clones share the list.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordingSink {
    saved: Arc<Mutex<Vec<(String, FinalizedRecording)>>>,
}

impl MemoryRecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recording saved so far, with its file name.
    pub fn saved(&self) -> Vec<(String, FinalizedRecording)> {
        self.saved.lock().clone()
    }
}

impl RecordingSink for MemoryRecordingSink {
    fn save(&mut self, file_name: &str, recording: &FinalizedRecording) -> io::Result<()> {
        self.saved
            .lock()
            .push((file_name.to_string(), recording.clone()));
        Ok(())
    }
}
