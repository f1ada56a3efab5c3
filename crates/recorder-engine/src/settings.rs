//! Settings persistence through an opaque blob store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use recorder_ipc::{RecorderSettings, SETTINGS_VERSION};
use tracing::{debug, warn};

use crate::RecorderResult;

/// Stores one settings blob.
pub trait SettingsStore: Send {
    fn persist(&self, blob: &[u8]) -> io::Result<()>;

    /// The stored blob, or `None` if nothing was stored yet.
    fn restore(&self) -> io::Result<Option<Vec<u8>>>;
}

/// Encode settings as pretty JSON.
pub fn encode_settings(settings: &RecorderSettings) -> RecorderResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(settings)?)
}

/// Decode a settings blob.
///
/// Unreadable blobs and blobs of another schema version yield the defaults.
pub fn decode_settings(blob: &[u8]) -> RecorderSettings {
    match serde_json::from_slice::<RecorderSettings>(blob) {
        Ok(settings) if settings.version == SETTINGS_VERSION => settings.sanitized(),
        Ok(settings) => {
            warn!(
                found = settings.version,
                expected = SETTINGS_VERSION,
                "Settings version mismatch, using defaults"
            );
            RecorderSettings::default()
        }
        Err(e) => {
            warn!("Unreadable settings, using defaults: {}", e);
            RecorderSettings::default()
        }
    }
}

/// Restore settings from `store`, falling back to the defaults.
pub fn load_settings(store: &dyn SettingsStore) -> RecorderSettings {
    match store.restore() {
        Ok(Some(blob)) => decode_settings(&blob),
        Ok(None) => {
            debug!("No stored settings");
            RecorderSettings::default()
        }
        Err(e) => {
            warn!("Failed to restore settings: {}", e);
            RecorderSettings::default()
        }
    }
}

/// Persist `settings` to `store`.
pub fn save_settings(store: &dyn SettingsStore, settings: &RecorderSettings) -> RecorderResult<()> {
    store.persist(&encode_settings(settings)?)?;
    Ok(())
}

/// In-memory store. Clones share the blob.
#[derive(Debug, Default, Clone)]
pub struct MemorySettingsStore {
    blob: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `blob`.
    pub fn with_blob(blob: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: Arc::new(Mutex::new(Some(blob.into()))),
        }
    }

    pub fn blob(&self) -> Option<Vec<u8>> {
        self.blob.lock().clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn persist(&self, blob: &[u8]) -> io::Result<()> {
        *self.blob.lock() = Some(blob.to_vec());
        Ok(())
    }

    fn restore(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().clone())
    }
}

/// Store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn persist(&self, blob: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, blob)
    }

    fn restore(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
